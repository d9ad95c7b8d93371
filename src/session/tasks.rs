use std::collections::HashMap;
use std::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::debug;

/// Registry of the session's background tasks (history fetch, event pump,
/// typing drain), keyed by role.
///
/// Spawning a role that is already registered aborts the predecessor first;
/// `cancel_all` aborts everything and runs on every conversation switch.
pub(crate) struct TaskSet {
    tasks: Mutex<HashMap<&'static str, JoinHandle<()>>>,
}

impl TaskSet {
    pub fn new() -> Self {
        Self {
            tasks: Mutex::new(HashMap::new()),
        }
    }

    pub fn spawn(&self, name: &'static str, handle: JoinHandle<()>) {
        let mut tasks = self.tasks.lock().expect("task set lock poisoned");
        if let Some(old) = tasks.insert(name, handle) {
            debug!("aborting superseded task '{}'", name);
            old.abort();
        }
    }

    pub fn cancel_all(&self) {
        let drained: Vec<(&'static str, JoinHandle<()>)> = {
            let mut tasks = self.tasks.lock().expect("task set lock poisoned");
            tasks.drain().collect()
        };
        for (name, handle) in drained {
            handle.abort();
            debug!("cancelled task '{}'", name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn spawn_and_cancel_all() {
        let tasks = TaskSet::new();
        tasks.spawn(
            "pump",
            tokio::spawn(async {
                tokio::time::sleep(Duration::from_secs(60)).await;
            }),
        );
        assert_eq!(tasks.tasks.lock().unwrap().len(), 1);
        tasks.cancel_all();
        assert!(tasks.tasks.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn respawning_a_role_aborts_the_predecessor() {
        let tasks = TaskSet::new();
        let first = tokio::spawn(async {
            tokio::time::sleep(Duration::from_secs(60)).await;
        });
        tasks.spawn("fetch", first);
        tasks.spawn(
            "fetch",
            tokio::spawn(async {
                tokio::time::sleep(Duration::from_secs(60)).await;
            }),
        );
        assert_eq!(tasks.tasks.lock().unwrap().len(), 1);
        tasks.cancel_all();
    }

    #[tokio::test]
    async fn cancel_all_on_empty_set() {
        let tasks = TaskSet::new();
        tasks.cancel_all();
        assert!(tasks.tasks.lock().unwrap().is_empty());
    }
}
