//! 结果汇聚（Result Sink）
//!
//! 分类器只依赖 `ResultSink` trait；默认实现基于 crossbeam 通道，
//! 多个工作线程并发写入，消费端在单线程按到达顺序读取。
use crossbeam_channel::{bounded, unbounded, Receiver, Sender};

use crate::classifier::FileResult;

/// 发往 sink 的消息
#[derive(Debug, Clone)]
pub enum SinkMessage {
    FileResult(FileResult),
    Trace(String),
    Error(String),
}

/// 结果与诊断信息的接收方（必须可被多线程同时写入）
pub trait ResultSink: Send + Sync {
    fn file_result(&self, result: FileResult);
    fn trace(&self, message: String);
    fn error(&self, message: String);
}

/// 通道写端，可克隆后分发到各线程
#[derive(Clone)]
pub struct ChannelSink {
    tx: Sender<SinkMessage>,
}

/// 通道读端
pub struct SinkReceiver {
    rx: Receiver<SinkMessage>,
}

impl ChannelSink {
    /// 无界通道：生产者永不阻塞
    pub fn unbounded() -> (ChannelSink, SinkReceiver) {
        let (tx, rx) = unbounded();
        (ChannelSink { tx }, SinkReceiver { rx })
    }

    /// 有界通道：消费端跟不上时对生产者施加背压
    pub fn bounded(capacity: usize) -> (ChannelSink, SinkReceiver) {
        let (tx, rx) = bounded(capacity);
        (ChannelSink { tx }, SinkReceiver { rx })
    }

    fn send(&self, msg: SinkMessage) {
        // 读端已丢弃时直接忽略
        let _ = self.tx.send(msg);
    }
}

impl ResultSink for ChannelSink {
    fn file_result(&self, result: FileResult) {
        self.send(SinkMessage::FileResult(result));
    }

    fn trace(&self, message: String) {
        self.send(SinkMessage::Trace(message));
    }

    fn error(&self, message: String) {
        self.send(SinkMessage::Error(message));
    }
}

impl SinkReceiver {
    /// 阻塞等待下一条消息；所有写端关闭后返回 None
    pub fn recv(&self) -> Option<SinkMessage> {
        self.rx.recv().ok()
    }

    pub fn try_recv(&self) -> Option<SinkMessage> {
        self.rx.try_recv().ok()
    }

    pub fn iter(&self) -> impl Iterator<Item = SinkMessage> + '_ {
        self.rx.iter()
    }

    /// 取出当前已排队的全部消息（不阻塞）
    pub fn drain(&self) -> Vec<SinkMessage> {
        self.rx.try_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_arrive_in_send_order_from_one_producer() {
        let (sink, rx) = ChannelSink::unbounded();
        sink.trace("a".into());
        sink.error("b".into());
        let got = rx.drain();
        assert!(matches!(&got[0], SinkMessage::Trace(m) if m == "a"));
        assert!(matches!(&got[1], SinkMessage::Error(m) if m == "b"));
        assert!(rx.try_recv().is_none());
    }

    #[test]
    fn dropped_receiver_does_not_panic() {
        let (sink, rx) = ChannelSink::bounded(1);
        drop(rx);
        sink.trace("ignored".into());
        sink.error("ignored".into());
    }

    #[test]
    fn iteration_ends_when_all_senders_drop() {
        let (sink, rx) = ChannelSink::unbounded();
        let workers: Vec<_> = (0..4)
            .map(|i| {
                let sink = sink.clone();
                std::thread::spawn(move || sink.trace(format!("worker {i}")))
            })
            .collect();
        drop(sink);
        for w in workers {
            w.join().unwrap();
        }
        assert_eq!(rx.iter().count(), 4);
    }
}
