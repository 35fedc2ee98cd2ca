use tokio::sync::watch;

/// 创建一对中断触发器和中断信号
pub fn interrupt_channel() -> (InterruptTrigger, InterruptSignal) {
    let (tx, rx) = watch::channel(None);
    (InterruptTrigger { tx }, InterruptSignal { rx })
}

/// 触发进程级中断（例如收到SIGTERM）
#[derive(Debug)]
pub struct InterruptTrigger {
    tx: watch::Sender<Option<String>>,
}

impl InterruptTrigger {
    /// 只有第一次触发的原因会被保留
    pub fn raise(&self, reason: impl Into<String>) {
        let reason = reason.into();
        self.tx.send_if_modified(|current| {
            if current.is_none() {
                *current = Some(reason);
                true
            } else {
                false
            }
        });
    }

    pub fn subscribe(&self) -> InterruptSignal {
        InterruptSignal {
            rx: self.tx.subscribe(),
        }
    }
}

/// 进程级中断信号，区别于普通的导入器错误
#[derive(Debug, Clone)]
pub struct InterruptSignal {
    rx: watch::Receiver<Option<String>>,
}

impl InterruptSignal {
    /// 永远不会触发的信号
    pub fn never() -> Self {
        let (tx, rx) = watch::channel(None);
        // 发送端被丢弃后 `raised` 会一直挂起
        drop(tx);
        Self { rx }
    }

    /// 已触发时返回中断原因
    pub fn reason(&self) -> Option<String> {
        self.rx.borrow().clone()
    }

    pub fn is_raised(&self) -> bool {
        self.rx.borrow().is_some()
    }

    /// 等待中断触发并返回原因；发送端已关闭且未触发时永远挂起
    pub async fn raised(&self) -> String {
        let mut rx = self.rx.clone();
        loop {
            let current = rx.borrow_and_update().clone();
            if let Some(reason) = current {
                return reason;
            }
            if rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

impl Default for InterruptSignal {
    fn default() -> Self {
        Self::never()
    }
}
