//! Fake for the RCON port: records every command, fails on demand.

use app_core::{RconError, RconPort, RconResult, RconTarget};
use async_trait::async_trait;
use std::sync::{
    Mutex,
    atomic::{AtomicU32, Ordering},
};

#[derive(Default)]
pub struct FakeRcon {
    commands: Mutex<Vec<(String, String)>>,
    /// number of upcoming commands that fail with `Unreachable`
    fail_remaining: AtomicU32,
}

impl FakeRcon {
    pub fn new() -> Self {
        FakeRcon::default()
    }

    /// The next `count` commands fail as unreachable.
    pub fn fail_next(&self, count: u32) {
        self.fail_remaining.store(count, Ordering::SeqCst);
    }

    pub fn sent_commands(&self) -> Vec<(String, String)> {
        self.commands.lock().unwrap().clone()
    }

    pub fn command_count(&self) -> usize {
        self.commands.lock().unwrap().len()
    }

    pub fn clear(&self) {
        self.commands.lock().unwrap().clear();
    }
}

#[async_trait]
impl RconPort for FakeRcon {
    async fn send_command(&self, target: &RconTarget, cmd: &str) -> RconResult<String> {
        loop {
            let remaining = self.fail_remaining.load(Ordering::SeqCst);
            if remaining == 0 {
                break;
            }
            if self
                .fail_remaining
                .compare_exchange(remaining, remaining - 1, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                return Err(RconError::Unreachable("injected failure".into()));
            }
        }
        self.commands
            .lock()
            .unwrap()
            .push((target.addr(), cmd.to_string()));
        Ok(String::new())
    }
}
