//! `ssh` reads passwords from its controlling terminal, so the client is
//! started on a pseudo terminal and driven through the master side.

use std::io;
use std::os::fd::OwnedFd;
use std::pin::Pin;
use std::process::Stdio;
use std::task::{ready, Context, Poll};
use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use nix::fcntl::{fcntl, FcntlArg, FdFlag, OFlag};
use nix::pty::openpty;
use tokio::io::unix::AsyncFd;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::process::{Child, Command};
use tokio::time::timeout;

use super::{ShellTransport, Spawner};

/// How long a session gets to exit on its own after `exit` was sent.
const EXIT_GRACE: Duration = Duration::from_secs(2);

/// Build the argv of the ssh client, wrapped in `ip netns exec` when the
/// target is only reachable from a network namespace.
pub fn ssh_command(
    user: &str,
    address: &str,
    namespace: Option<&str>,
    connect_timeout_secs: u64,
) -> Vec<String> {
    let mut argv = Vec::new();
    if let Some(namespace) = namespace {
        argv.extend(["ip", "netns", "exec", namespace].map(String::from));
    }
    argv.extend(
        [
            "ssh",
            "-q",
            "-oStrictHostKeyChecking=no",
            "-oUserKnownHostsFile=/dev/null",
            "-oPubkeyAuthentication=no",
        ]
        .map(String::from),
    );
    argv.push(format!("-oConnectTimeout={}", connect_timeout_secs));
    argv.push(format!("{}@{}", user, address));
    argv
}

/// Spawns commands on a fresh pseudo terminal.
#[derive(Debug, Default, Clone, Copy)]
pub struct PtySpawner;

impl Spawner for PtySpawner {
    type Transport = PtyProcess;

    fn spawn(&self, argv: &[String]) -> io::Result<PtyProcess> {
        PtyProcess::spawn(argv)
    }
}

/// A child process whose stdio is the slave side of a pty.  The child is
/// killed when this value is dropped.
pub struct PtyProcess {
    master: AsyncFd<OwnedFd>,
    child: Child,
}

impl PtyProcess {
    pub fn spawn(argv: &[String]) -> io::Result<Self> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "empty command"))?;

        let pty = openpty(None, None)?;
        fcntl(&pty.master, FcntlArg::F_SETFL(OFlag::O_NONBLOCK))?;
        fcntl(&pty.master, FcntlArg::F_SETFD(FdFlag::FD_CLOEXEC))?;
        fcntl(&pty.slave, FcntlArg::F_SETFD(FdFlag::FD_CLOEXEC))?;

        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::from(pty.slave.try_clone()?))
            .stdout(Stdio::from(pty.slave.try_clone()?))
            .stderr(Stdio::from(pty.slave))
            .kill_on_drop(true);
        // The child needs its own session with the pty as controlling
        // terminal, otherwise ssh cannot open /dev/tty for the password.
        unsafe {
            command.pre_exec(|| {
                nix::unistd::setsid()?;
                if libc::ioctl(0, libc::TIOCSCTTY as _, 0) < 0 {
                    return Err(io::Error::last_os_error());
                }
                Ok(())
            });
        }
        let child = command.spawn()?;
        // Dropping `command` closes the parent's copies of the slave, so
        // reads on the master report EOF once the child is gone.
        drop(command);

        Ok(Self {
            master: AsyncFd::new(pty.master)?,
            child,
        })
    }
}

#[async_trait]
impl ShellTransport for PtyProcess {
    async fn terminate(&mut self) {
        match timeout(EXIT_GRACE, self.child.wait()).await {
            Ok(Ok(status)) => debug!("ssh exited: {}", status),
            _ => {
                if let Err(e) = self.child.kill().await {
                    debug!("Failed to kill ssh: {}", e);
                }
            }
        }
    }
}

impl AsyncRead for PtyProcess {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        loop {
            let mut guard = ready!(this.master.poll_read_ready(cx))?;
            let unfilled = buf.initialize_unfilled();
            match guard.try_io(|fd| nix::unistd::read(fd.get_ref(), unfilled).map_err(io::Error::from)) {
                Ok(Ok(n)) => {
                    buf.advance(n);
                    return Poll::Ready(Ok(()));
                }
                // Linux reports a hung-up slave as EIO.
                Ok(Err(e)) if e.raw_os_error() == Some(libc::EIO) => return Poll::Ready(Ok(())),
                Ok(Err(e)) => return Poll::Ready(Err(e)),
                Err(_would_block) => continue,
            }
        }
    }
}

impl AsyncWrite for PtyProcess {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        loop {
            let mut guard = ready!(this.master.poll_write_ready(cx))?;
            match guard.try_io(|fd| nix::unistd::write(fd.get_ref(), buf).map_err(io::Error::from)) {
                Ok(result) => return Poll::Ready(result),
                Err(_would_block) => continue,
            }
        }
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}
