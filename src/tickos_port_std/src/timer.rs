//! Wall-clock tick source
use std::{
    sync::mpsc,
    thread::JoinHandle,
    time::{Duration, Instant},
};

enum TimerCmd {
    Stop,
}

/// Produces a tick every `period` on a background thread.
pub(crate) struct Ticker {
    cmd_send: Option<mpsc::Sender<TimerCmd>>,
    tick_recv: mpsc::Receiver<()>,
    join_handle: Option<JoinHandle<()>>,
}

impl Ticker {
    pub(crate) fn new(period: Duration) -> Self {
        let (cmd_send, cmd_recv) = mpsc::channel();
        let (tick_send, tick_recv) = mpsc::channel();

        log::trace!("starting the timer thread");
        let join_handle = std::thread::spawn(move || {
            let mut next_deadline = Instant::now() + period;
            loop {
                let timeout = next_deadline.saturating_duration_since(Instant::now());
                match cmd_recv.recv_timeout(timeout) {
                    Err(mpsc::RecvTimeoutError::Disconnected) | Ok(TimerCmd::Stop) => {
                        break;
                    }
                    Err(mpsc::RecvTimeoutError::Timeout) => {
                        if tick_send.send(()).is_err() {
                            break;
                        }
                        next_deadline += period;
                    }
                }
            }
        });

        Self {
            cmd_send: Some(cmd_send),
            tick_recv,
            join_handle: Some(join_handle),
        }
    }

    /// Block until the next tick.
    pub(crate) fn wait(&self) {
        // The timer thread only exits after `TimerCmd::Stop`
        self.tick_recv.recv().unwrap();
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        log::trace!("stopping the timer thread");
        if let Some(cmd_send) = self.cmd_send.take() {
            let _ = cmd_send.send(TimerCmd::Stop);
        }
        if let Some(join_handle) = self.join_handle.take() {
            join_handle.join().unwrap();
        }
        log::trace!("stopped the timer thread");
    }
}
