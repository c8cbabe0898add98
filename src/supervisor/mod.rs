use log::debug;
use std::io;
use std::thread::{self, JoinHandle};

/// How a supervised worker ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerExit {
    Returned(String),
    Panicked(String),
}

impl std::fmt::Display for WorkerExit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkerExit::Returned(name) => write!(f, "Worker {} returned", name),
            WorkerExit::Panicked(name) => write!(f, "Worker {} panicked", name),
        }
    }
}

/// Runs `work` on a thread called `name` and a watcher next to it. The workers
/// are meant to run forever, so `on_exit` is called as soon as `work` ends.
pub fn spawn_supervised<W, E>(name: &str, work: W, on_exit: E) -> io::Result<JoinHandle<()>>
where
    W: FnOnce() + Send + 'static,
    E: FnOnce(WorkerExit) + Send + 'static,
{
    let worker = thread::Builder::new().name(name.to_string()).spawn(work)?;
    let worker_name = name.to_string();

    thread::Builder::new()
        .name(format!("{}-watch", name))
        .spawn(move || {
            debug!("Watching worker {}", worker_name);
            let exit = match worker.join() {
                Ok(()) => WorkerExit::Returned(worker_name),
                Err(_) => WorkerExit::Panicked(worker_name),
            };
            on_exit(exit);
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::time::Duration;

    #[test]
    fn test_panicking_worker_is_reported() {
        let (tx, rx) = mpsc::channel();
        let watcher = spawn_supervised("meter-poller", || { panic!("serial line gone"); }, move |exit| {
            tx.send(exit).unwrap();
        }).unwrap();

        watcher.join().unwrap();
        let exit = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(exit, WorkerExit::Panicked("meter-poller".to_string()));
        assert_eq!(exit.to_string(), "Worker meter-poller panicked");
    }

    #[test]
    fn test_returning_worker_is_reported() {
        let (tx, rx) = mpsc::channel();
        let watcher = spawn_supervised("short-lived", || {}, move |exit| {
            tx.send(exit).unwrap();
        }).unwrap();

        watcher.join().unwrap();
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), WorkerExit::Returned("short-lived".to_string()));
    }

    #[test]
    fn test_running_worker_is_not_reported() {
        let (tx, rx) = mpsc::channel();
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let watcher = spawn_supervised("busy", move || {
            let _ = stop_rx.recv();
        }, move |exit| {
            tx.send(exit).unwrap();
        }).unwrap();

        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
        stop_tx.send(()).unwrap();
        watcher.join().unwrap();
        assert!(rx.recv().is_ok());
    }
}
