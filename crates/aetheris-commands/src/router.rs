//! The Command Router (§4.H): per-robot FIFO with emergency-stop priority,
//! ack correlation by `command_id`, timeout-driven audit logging.

use crate::error::Result;
use crate::publisher::CommandPublisher;
use aetheris_shared::{Command, CommandAck, LogLevel};
use aetheris_store::EntityStore;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, Mutex, Notify, RwLock};
use tracing::{debug, warn};
use uuid::Uuid;

struct RobotQueue {
    pending: Mutex<VecDeque<Command>>,
    notify: Notify,
}

impl RobotQueue {
    fn new() -> Self {
        Self {
            pending: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
        }
    }

    async fn enqueue(&self, command: Command) {
        let mut pending = self.pending.lock().await;
        if command.command_type.is_emergency() {
            pending.push_front(command);
        } else {
            pending.push_back(command);
        }
        drop(pending);
        self.notify.notify_one();
    }

    async fn dequeue(&self) -> Command {
        loop {
            {
                let mut pending = self.pending.lock().await;
                if let Some(cmd) = pending.pop_front() {
                    return cmd;
                }
            }
            self.notify.notified().await;
        }
    }
}

/// Routes `(robot_id, Command)` pairs to per-robot FIFO queues, each
/// drained by a lazily-spawned background task (§4.H, §5).
pub struct CommandRouter {
    store: Arc<EntityStore>,
    publisher: Arc<dyn CommandPublisher>,
    queues: RwLock<HashMap<String, Arc<RobotQueue>>>,
    waiters: Arc<Mutex<HashMap<Uuid, oneshot::Sender<CommandAck>>>>,
}

impl CommandRouter {
    pub fn new(store: Arc<EntityStore>, publisher: Arc<dyn CommandPublisher>) -> Self {
        Self {
            store,
            publisher,
            queues: RwLock::new(HashMap::new()),
            waiters: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    async fn queue_for(&self, robot_id: &str) -> Arc<RobotQueue> {
        if let Some(queue) = self.queues.read().await.get(robot_id) {
            return queue.clone();
        }
        let mut queues = self.queues.write().await;
        if let Some(queue) = queues.get(robot_id) {
            return queue.clone();
        }
        let queue = Arc::new(RobotQueue::new());
        queues.insert(robot_id.to_string(), queue.clone());
        self.spawn_drain_task(robot_id.to_string(), queue.clone());
        queue
    }

    fn spawn_drain_task(&self, robot_id: String, queue: Arc<RobotQueue>) {
        let publisher = self.publisher.clone();
        let store = self.store.clone();
        let waiters = self.waiters.clone();
        tokio::spawn(async move {
            loop {
                let command = queue.dequeue().await;
                let is_emergency = command.command_type.is_emergency();
                let command_id = command.command_id;
                let timeout = Duration::from_secs(command.timeout);

                if let Err(e) = publisher.publish(&robot_id, &command).await {
                    warn!(robot_id = %robot_id, error = %e, "failed to publish command");
                    continue;
                }

                let (tx, rx) = oneshot::channel();
                waiters.lock().await.insert(command_id, tx);

                if is_emergency {
                    await_ack_or_timeout(&store, &robot_id, command_id, timeout, rx, &waiters).await;
                } else {
                    let store = store.clone();
                    let robot_id = robot_id.clone();
                    let waiters = waiters.clone();
                    tokio::spawn(async move {
                        await_ack_or_timeout(&store, &robot_id, command_id, timeout, rx, &waiters).await;
                    });
                }
            }
        });
    }

    /// Enqueues a directed command for one robot (§4.H).
    pub async fn send(&self, robot_id: &str, command: Command) -> Result<()> {
        self.queue_for(robot_id).await.enqueue(command).await;
        Ok(())
    }

    /// Fans a command out to every robot known to the Entity Store at
    /// enqueue time, one per-robot enqueue each so per-robot FIFO holds
    /// (§4.H).
    pub async fn broadcast(&self, command: Command) -> Result<()> {
        let robots = self.store.list_robots()?;
        for robot in robots {
            let mut per_robot = command.clone();
            per_robot.command_id = Uuid::new_v4();
            self.send(&robot.robot_id, per_robot).await?;
        }
        Ok(())
    }

    /// Delivers an ack received off `<ns>/commands/<robot_id>/ack` to
    /// whichever waiter (emergency-stop drain or timeout watcher) is
    /// expecting it. A stale or unknown `command_id` is silently dropped.
    pub async fn handle_ack(&self, ack: CommandAck) {
        if let Some(tx) = self.waiters.lock().await.remove(&ack.command_id) {
            let _ = tx.send(ack);
        } else {
            debug!(command_id = %ack.command_id, "ack for unknown or already-resolved command");
        }
    }
}

async fn await_ack_or_timeout(
    store: &EntityStore,
    robot_id: &str,
    command_id: Uuid,
    timeout: Duration,
    rx: oneshot::Receiver<CommandAck>,
    waiters: &Arc<Mutex<HashMap<Uuid, oneshot::Sender<CommandAck>>>>,
) {
    match tokio::time::timeout(timeout, rx).await {
        Ok(Ok(_ack)) => {}
        _ => {
            waiters.lock().await.remove(&command_id);
            let _ = store.append_log(
                LogLevel::Warning,
                "command_timeout",
                &format!("command {command_id} to {robot_id} timed out unacknowledged"),
                Some(robot_id),
                serde_json::json!({ "command_id": command_id.to_string() }),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aetheris_shared::{AckStatus, CommandType};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Mutex as TokioMutex;

    struct RecordingPublisher {
        published: TokioMutex<Vec<(String, Command)>>,
        calls: AtomicUsize,
    }

    impl RecordingPublisher {
        fn new() -> Self {
            Self {
                published: TokioMutex::new(Vec::new()),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait::async_trait]
    impl CommandPublisher for RecordingPublisher {
        async fn publish(&self, robot_id: &str, command: &Command) -> anyhow::Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.published.lock().await.push((robot_id.to_string(), command.clone()));
            Ok(())
        }
    }

    #[tokio::test]
    async fn send_publishes_command_to_robot() {
        let store = Arc::new(EntityStore::open_in_memory().unwrap());
        let publisher = Arc::new(RecordingPublisher::new());
        let router = CommandRouter::new(store, publisher.clone());

        router
            .send("RV-001", Command::new(CommandType::Move, serde_json::json!({})))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(publisher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn ack_resolves_pending_waiter() {
        let store = Arc::new(EntityStore::open_in_memory().unwrap());
        let publisher = Arc::new(RecordingPublisher::new());
        let router = CommandRouter::new(store, publisher.clone());

        let command = Command::new(CommandType::Stop, serde_json::Value::Null);
        let command_id = command.command_id;
        router.send("RV-001", command).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        router
            .handle_ack(CommandAck {
                command_id,
                robot_id: "RV-001".to_string(),
                status: AckStatus::Completed,
                detail: None,
            })
            .await;

        // Waiter should be gone, no audit log should appear for this command.
        assert!(router.waiters.lock().await.get(&command_id).is_none());
    }

    #[tokio::test]
    async fn broadcast_enqueues_per_known_robot() {
        let store = Arc::new(EntityStore::open_in_memory().unwrap());
        store.upsert_robot_on_seen("RV-001", chrono::Utc::now(), None).unwrap();
        store.upsert_robot_on_seen("RV-002", chrono::Utc::now(), None).unwrap();
        let publisher = Arc::new(RecordingPublisher::new());
        let router = CommandRouter::new(store, publisher.clone());

        router
            .broadcast(Command::new(CommandType::StatusQuery, serde_json::Value::Null))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(publisher.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn emergency_stop_is_placed_ahead_of_queued_commands() {
        // Exercises RobotQueue directly (no drain task) so the ordering
        // assertion isn't racing a background consumer.
        let queue = RobotQueue::new();
        queue.enqueue(Command::new(CommandType::Move, serde_json::Value::Null)).await;
        queue.enqueue(Command::new(CommandType::Gesture, serde_json::Value::Null)).await;
        queue.enqueue(Command::emergency_stop()).await;

        let first = queue.dequeue().await;
        assert!(first.command_type.is_emergency());
    }
}
