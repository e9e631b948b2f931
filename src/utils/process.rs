// Copyright 2026 Export Share Developers
// SPDX-License-Identifier: GPL-3.0-or-later

use std::{
    ffi::OsStr,
    io::{self, ErrorKind, Read},
    os::unix::process::CommandExt,
    process::{Child, Command, ExitStatus, Stdio},
    sync::{
        Arc, OnceLock,
        atomic::{AtomicBool, Ordering},
        mpsc::{self, Receiver, RecvTimeoutError},
    },
    thread,
    time::{Duration, Instant},
};

use crate::defs;

/// Shared flag used to abort a running external command.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

static INTERRUPT_TOKEN: OnceLock<CancelToken> = OnceLock::new();

extern "C" fn on_interrupt(_signal: libc::c_int) {
    if let Some(token) = INTERRUPT_TOKEN.get() {
        token.cancel();
    }
}

/// Turns SIGINT/SIGTERM into a cancelled token instead of killing us, so a
/// running nfsd step gets torn down rather than orphaned in its own group.
pub fn cancel_on_interrupt() -> io::Result<CancelToken> {
    let token = INTERRUPT_TOKEN.get_or_init(CancelToken::new).clone();
    let handler = on_interrupt as extern "C" fn(libc::c_int);

    for signal in [libc::SIGINT, libc::SIGTERM] {
        unsafe {
            if libc::signal(signal, handler as libc::sighandler_t) == libc::SIG_ERR {
                return Err(io::Error::last_os_error());
            }
        }
    }

    Ok(token)
}

#[derive(Debug)]
pub enum Completion {
    Exited(ExitStatus),
    TimedOut,
    Cancelled,
}

#[derive(Debug)]
pub struct CommandOutput {
    pub completion: Completion,
    /// stdout and stderr interleaved in the order the child wrote them.
    pub combined: String,
}

/// Runs `program args..` with stdout and stderr sharing one pipe. The child
/// runs in its own process group, which is killed once `timeout` elapses or
/// `cancel` fires. Output is collected within the same deadline, so a
/// background process holding the pipe open cannot stall the caller.
pub fn run_bounded<S: AsRef<OsStr>>(
    program: &OsStr,
    args: &[S],
    timeout: Duration,
    cancel: &CancelToken,
) -> io::Result<CommandOutput> {
    let (mut reader, writer) = io::pipe()?;

    let mut child = {
        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .process_group(0)
            .stdout(writer.try_clone()?)
            .stderr(writer);
        cmd.spawn()?
        // cmd drops here, closing our copies of the write end
    };

    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut chunk = [0u8; 4096];
        loop {
            match reader.read(&mut chunk) {
                Ok(0) => break,
                Ok(n) => {
                    if tx.send(chunk[..n].to_vec()).is_err() {
                        break;
                    }
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(_) => break,
            }
        }
    });

    // None when the timeout is too large to represent
    let deadline = Instant::now().checked_add(timeout);
    let poll = Duration::from_millis(defs::STEP_POLL_INTERVAL_MS);

    let completion = loop {
        if let Some(status) = child.try_wait()? {
            break Completion::Exited(status);
        }
        if cancel.is_cancelled() {
            kill_and_reap(&mut child);
            break Completion::Cancelled;
        }
        if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            kill_and_reap(&mut child);
            break Completion::TimedOut;
        }
        thread::sleep(poll);
    };

    let mut raw = Vec::new();
    let closed = match completion {
        Completion::Exited(_) => drain(&rx, &mut raw, deadline, Some(cancel)),
        Completion::TimedOut | Completion::Cancelled => false,
    };

    if !closed {
        if let Completion::Exited(_) = completion {
            tracing::warn!(
                "{} exited but its output is still open; killing its process group",
                program.to_string_lossy()
            );
            kill_group(child.id() as libc::pid_t);
        }

        let grace = Instant::now() + Duration::from_millis(defs::STEP_OUTPUT_GRACE_MS);
        if !drain(&rx, &mut raw, Some(grace), None) {
            tracing::warn!(
                "Gave up waiting for the rest of the output of {}",
                program.to_string_lossy()
            );
        }
    }

    Ok(CommandOutput {
        completion,
        combined: String::from_utf8_lossy(&raw).trim_end().to_string(),
    })
}

/// Appends chunks until the write end closes. Returns false if `until`
/// passes or `cancel` fires first.
fn drain(
    rx: &Receiver<Vec<u8>>,
    buf: &mut Vec<u8>,
    until: Option<Instant>,
    cancel: Option<&CancelToken>,
) -> bool {
    let poll = Duration::from_millis(defs::STEP_POLL_INTERVAL_MS);

    loop {
        let wait = match until {
            Some(until) => {
                let left = until.saturating_duration_since(Instant::now());
                if left.is_zero() {
                    return false;
                }
                left.min(poll)
            }
            None => poll,
        };

        match rx.recv_timeout(wait) {
            Ok(chunk) => buf.extend_from_slice(&chunk),
            Err(RecvTimeoutError::Disconnected) => return true,
            Err(RecvTimeoutError::Timeout) => {
                if cancel.is_some_and(CancelToken::is_cancelled) {
                    return false;
                }
            }
        }
    }
}

fn kill_group(pgid: libc::pid_t) -> bool {
    unsafe {
        if libc::killpg(pgid, libc::SIGKILL) != 0 {
            let err = io::Error::last_os_error();
            tracing::warn!("Failed to kill process group {}: {}", pgid, err);
            return false;
        }
    }
    true
}

fn kill_and_reap(child: &mut Child) {
    if !kill_group(child.id() as libc::pid_t) {
        let _ = child.kill();
    }
    let _ = child.wait();
}
