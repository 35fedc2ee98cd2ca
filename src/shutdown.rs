use std::sync::Arc;

use tokio::signal;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use student_import_core::{interrupt_channel, InterruptSignal, InterruptTrigger};

/// 优雅关闭管理器
///
/// 收到关闭信号时触发进程级中断，正在执行的导入会以 `Interrupted` 结束。
#[derive(Clone)]
pub struct ShutdownManager {
    trigger: Arc<InterruptTrigger>,
    signal: InterruptSignal,
}

impl ShutdownManager {
    pub fn new() -> Self {
        let (trigger, signal) = interrupt_channel();
        Self {
            trigger: Arc::new(trigger),
            signal,
        }
    }

    /// 订阅中断信号
    pub fn subscribe(&self) -> InterruptSignal {
        self.signal.clone()
    }

    /// 触发关闭，重复调用时保留第一次的原因
    pub fn shutdown(&self, reason: impl Into<String>) {
        if self.signal.is_raised() {
            debug!("关闭管理器已经触发过关闭");
            return;
        }

        let reason = reason.into();
        info!("触发系统关闭: {reason}");
        self.trigger.raise(reason);
    }

    pub fn is_shutdown(&self) -> bool {
        self.signal.is_raised()
    }

    /// 等待关闭并返回原因
    pub async fn wait_for_shutdown(&self) -> String {
        self.signal.raised().await
    }

    /// 在后台监听Ctrl+C和SIGTERM
    pub fn listen_for_signals(&self) -> JoinHandle<()> {
        let manager = self.clone();
        tokio::spawn(async move {
            let reason = wait_for_shutdown_signal().await;
            manager.shutdown(reason);
        })
    }
}

impl Default for ShutdownManager {
    fn default() -> Self {
        Self::new()
    }
}

/// 等待关闭信号；信号处理器安装失败时只记录错误
async fn wait_for_shutdown_signal() -> &'static str {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("安装Ctrl+C信号处理器失败: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("安装SIGTERM信号处理器失败: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("收到Ctrl+C信号");
            "SIGINT"
        },
        _ = terminate => {
            info!("收到SIGTERM信号");
            "SIGTERM"
        },
    }
}
