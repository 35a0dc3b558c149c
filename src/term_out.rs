use std::io::Write as _;
use std::sync::mpsc;
use std::time::{Duration, Instant};

pub(crate) fn init(start: Instant, enable_progress: bool) -> Handle {
    let (sender, receiver) = mpsc::channel();

    let join_handle = std::thread::Builder::new()
        .name("term out".into())
        .spawn(move || thread_main(start, enable_progress, receiver))
        .expect("failed to spawn thread");

    Handle {
        join_handle,
        sender,
    }
}

const UPDATE_PERIOD: Duration = Duration::from_millis(50);

/// The progress line at the bottom of stderr, with log lines scrolling
/// above it.
struct Screen {
    start: Instant,
    stderr: std::io::Stderr,
    progress: Option<String>,
    last_draw: Instant,
    dirty: bool,
}

impl Screen {
    fn draw(&mut self) {
        if let Some(ref progress) = self.progress {
            let line = render_progress_line(self.start, progress);
            handle_err(crossterm::queue!(
                self.stderr,
                crossterm::cursor::MoveToColumn(0),
                crossterm::style::Print(line),
                crossterm::terminal::Clear(crossterm::terminal::ClearType::UntilNewLine),
            ));
            handle_err(self.stderr.flush());
        }
        self.last_draw = Instant::now();
        self.dirty = false;
    }

    /// Leaves the current progress line on screen and stops updating it.
    fn freeze(&mut self) {
        if self.progress.is_some() {
            if self.dirty {
                self.draw();
            }
            handle_err(crossterm::queue!(
                self.stderr,
                crossterm::style::Print('\n'),
                crossterm::cursor::MoveToColumn(0),
            ));
            handle_err(self.stderr.flush());
        }
        self.progress = None;
    }

    fn print_line(&mut self, line: &[u8]) {
        if self.progress.is_some() {
            handle_err(crossterm::queue!(
                self.stderr,
                crossterm::terminal::Clear(crossterm::terminal::ClearType::CurrentLine),
                crossterm::cursor::MoveToColumn(0),
            ));
            handle_err(self.stderr.write_all(line));
            self.draw();
        } else {
            handle_err(self.stderr.write_all(line));
            handle_err(self.stderr.flush());
        }
    }

    fn set_progress(&mut self, progress: String) {
        self.progress = Some(progress);
        if self.last_draw.elapsed() >= UPDATE_PERIOD {
            self.draw();
        } else {
            self.dirty = true;
        }
    }

    fn next_wakeup(&self) -> Option<Duration> {
        self.progress.as_ref()?;
        if self.dirty {
            Some(UPDATE_PERIOD.saturating_sub(self.last_draw.elapsed()))
        } else {
            // Keep the clock ticking.
            Some(duration_to_next_second(self.start.elapsed()))
        }
    }
}

fn thread_main(start: Instant, enable_progress: bool, receiver: mpsc::Receiver<Command>) {
    let mut screen = Screen {
        start,
        stderr: std::io::stderr(),
        progress: None,
        last_draw: start,
        dirty: false,
    };

    loop {
        let cmd = match screen.next_wakeup() {
            Some(timeout) if timeout.is_zero() => Err(mpsc::RecvTimeoutError::Timeout),
            Some(timeout) => receiver.recv_timeout(timeout),
            None => receiver.recv().map_err(|e| e.into()),
        };

        match cmd {
            Ok(Command::Finish) | Err(mpsc::RecvTimeoutError::Disconnected) => {
                screen.freeze();
                break;
            }
            Ok(Command::PrintRawLine(line)) => screen.print_line(&line),
            Ok(Command::SetProgress(progress)) => {
                if enable_progress {
                    screen.set_progress(progress);
                }
            }
            Ok(Command::FreezeProgress) => screen.freeze(),
            Err(mpsc::RecvTimeoutError::Timeout) => screen.draw(),
        }
    }
}

fn render_progress_line(start: Instant, line: &str) -> String {
    let elapsed = start.elapsed().as_secs();
    let secs = elapsed % 60;
    let mins = (elapsed / 60) % 60;
    let hours = elapsed / 3600;

    format!("[{hours:02}:{mins:02}:{secs:02}] {line}")
}

fn handle_err<T>(r: std::io::Result<T>) -> T {
    r.expect("stderr write failed")
}

fn duration_to_next_second(duration: Duration) -> Duration {
    let subsec_nanos = duration.subsec_nanos();
    if subsec_nanos == 0 {
        Duration::ZERO
    } else {
        Duration::from_nanos((1_000_000_000 - subsec_nanos).into())
    }
}

enum Command {
    Finish,
    PrintRawLine(Vec<u8>),
    SetProgress(String),
    FreezeProgress,
}

pub(crate) struct Handle {
    join_handle: std::thread::JoinHandle<()>,
    sender: mpsc::Sender<Command>,
}

impl Handle {
    pub(crate) fn finish(self) {
        self.sender
            .send(Command::Finish)
            .expect("term out endpoint closed");
        self.join_handle.join().expect("term out thread panicked");
    }

    pub(crate) fn get_progress_print(&self) -> ProgressPrint {
        ProgressPrint {
            sender: Some(self.sender.clone()),
        }
    }
}

/// Sends progress updates and log lines to the terminal thread. Cheap to
/// clone and usable from worker threads.
#[derive(Clone)]
pub(crate) struct ProgressPrint {
    sender: Option<mpsc::Sender<Command>>,
}

impl ProgressPrint {
    /// A printer with no terminal behind it; everything sent is dropped.
    #[cfg(test)]
    pub(crate) fn silent() -> Self {
        Self { sender: None }
    }

    fn send(&self, cmd: Command) {
        if let Some(ref sender) = self.sender {
            sender.send(cmd).expect("term out endpoint closed");
        }
    }

    pub(crate) fn set_progress(&self, progress: String) {
        self.send(Command::SetProgress(progress));
    }

    pub(crate) fn freeze_progress(&self) {
        self.send(Command::FreezeProgress);
    }

    pub(crate) fn print_raw_line(&self, line: Vec<u8>) {
        self.send(Command::PrintRawLine(line));
    }
}
