//! 시뮬레이션 거래소의 타입별 이벤트 채널.

use std::sync::Arc;

use tokio::sync::{mpsc, RwLock};
use tracing::warn;

/// 구독 채널 기본 버퍼 크기.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// 한 종류의 이벤트를 여러 구독자에게 전달하는 브로드캐스터.
///
/// 채널은 유한 버퍼이며, 가득 찬 구독자에게는 이벤트를 버리고 경고를 남깁니다.
/// 리플레이를 막지 않도록 전송은 대기하지 않습니다.
pub struct EventBroadcaster<T: Clone + Send> {
    /// 이벤트 종류 (로그용)
    kind: &'static str,
    senders: Arc<RwLock<Vec<mpsc::Sender<T>>>>,
}

impl<T: Clone + Send> EventBroadcaster<T> {
    /// 새로운 이벤트 브로드캐스터를 생성합니다.
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            senders: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// 이벤트를 구독하고 수신기를 가져옵니다.
    pub async fn subscribe(&self, buffer_size: usize) -> mpsc::Receiver<T> {
        let (tx, rx) = mpsc::channel(buffer_size.max(1));
        self.senders.write().await.push(tx);
        rx
    }

    /// 모든 구독자에게 이벤트를 보냅니다. 끊긴 구독자는 제거합니다.
    pub async fn broadcast(&self, event: T) {
        let mut closed = false;
        {
            let senders = self.senders.read().await;
            for sender in senders.iter() {
                match sender.try_send(event.clone()) {
                    Ok(()) => {}
                    Err(mpsc::error::TrySendError::Full(_)) => {
                        warn!(kind = self.kind, "구독자 버퍼가 가득 차 이벤트를 버립니다");
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => closed = true,
                }
            }
        }
        if closed {
            self.cleanup().await;
        }
    }

    /// 연결이 끊긴 구독자를 제거합니다.
    pub async fn cleanup(&self) {
        let mut senders = self.senders.write().await;
        senders.retain(|sender| !sender.is_closed());
    }

    /// 현재 구독자 수.
    pub async fn subscriber_count(&self) -> usize {
        self.senders.read().await.len()
    }
}
