use anyhow::Result;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::{Duration, Instant};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UiMode {
    Auto,
    Plain,
    Pretty,
}

/// Progress reporting on stderr. Stdout is reserved for JSON reports.
#[derive(Clone, Debug)]
pub struct Ui {
    mode: UiMode,
    is_tty: bool,
    stdout_piped: bool,
}

impl Ui {
    pub fn new(mode: UiMode, is_tty: bool, stdout_piped: bool) -> Self {
        Self {
            mode,
            is_tty,
            stdout_piped,
        }
    }

    pub fn from_args(ui_flag: Option<&str>, is_tty: bool, stdout_piped: bool) -> Self {
        let mode = match ui_flag {
            Some("plain") => UiMode::Plain,
            Some("pretty") => UiMode::Pretty,
            _ => UiMode::Auto,
        };
        Self::new(mode, is_tty, stdout_piped)
    }

    /// Spinners and bars only on a terminal; `auto` also backs off when stdout is piped.
    fn animated(&self) -> bool {
        self.is_tty
            && match self.mode {
                UiMode::Pretty => true,
                UiMode::Auto => !self.stdout_piped,
                UiMode::Plain => false,
            }
    }

    /// Start a named stage. It reports success only if [`Stage::done`] is called.
    pub fn stage(&self, name: &str) -> Stage {
        let spinner = self.animated().then(|| {
            let spinner = ProgressBar::with_draw_target(None, ProgressDrawTarget::stderr());
            spinner.set_style(
                ProgressStyle::with_template("{spinner} {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner()),
            );
            spinner.enable_steady_tick(Duration::from_millis(120));
            spinner.set_message(format!("{name}…"));
            spinner
        });
        if spinner.is_none() {
            eprintln!("==> {name}");
        }
        Stage {
            name: name.to_string(),
            start: Instant::now(),
            spinner,
            finished: false,
        }
    }

    /// Run `work` as a stage, marking it failed when it returns an error.
    pub fn run<T>(&self, name: &str, work: impl FnOnce() -> Result<T>) -> Result<T> {
        let stage = self.stage(name);
        let value = work()?;
        stage.done();
        Ok(value)
    }

    /// Progress over `total` items that may individually fail.
    pub fn items(&self, total: usize, noun: &'static str) -> ItemProgress {
        let bar = self.animated().then(|| {
            let bar =
                ProgressBar::with_draw_target(Some(total as u64), ProgressDrawTarget::stderr());
            bar.set_style(
                ProgressStyle::with_template("{bar:30} {pos}/{len} {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_bar()),
            );
            bar
        });
        ItemProgress {
            bar,
            noun,
            total,
            ok: 0,
            failed: 0,
            start: Instant::now(),
        }
    }
}

/// Outcome marker shared by stage and item lines.
fn mark(ok: bool) -> &'static str {
    if ok {
        "✔"
    } else {
        "✘"
    }
}

pub struct Stage {
    name: String,
    start: Instant,
    spinner: Option<ProgressBar>,
    finished: bool,
}

impl Stage {
    pub fn done(mut self) {
        self.report(true);
    }

    fn report(&mut self, ok: bool) {
        if self.finished {
            return;
        }
        self.finished = true;
        let status = if ok { "" } else { " failed" };
        let line = format!(
            "{} {}{} ({})",
            mark(ok),
            self.name,
            status,
            format_duration(self.start.elapsed())
        );
        match &self.spinner {
            Some(spinner) => spinner.finish_with_message(line),
            None => eprintln!("{line}"),
        }
    }
}

impl Drop for Stage {
    /// A stage dropped without `done` was cut short by an error.
    fn drop(&mut self) {
        self.report(false);
    }
}

pub struct ItemProgress {
    bar: Option<ProgressBar>,
    noun: &'static str,
    total: usize,
    ok: usize,
    failed: usize,
    start: Instant,
}

impl ItemProgress {
    pub fn item_done(&mut self, label: &str, failed: bool) {
        if failed {
            self.failed += 1;
        } else {
            self.ok += 1;
        }
        let line = format!("{} {}", mark(!failed), label);
        match &self.bar {
            Some(bar) => {
                bar.set_message(line);
                bar.inc(1);
            }
            None => eprintln!("[{}/{}] {}", self.ok + self.failed, self.total, line),
        }
    }

    pub fn finish(self) {
        let line = format!(
            "{} {} {}, {} failed ({})",
            mark(self.failed == 0),
            self.ok,
            self.noun,
            self.failed,
            format_duration(self.start.elapsed())
        );
        match self.bar {
            Some(bar) => bar.finish_with_message(line),
            None => eprintln!("{line}"),
        }
    }
}

fn format_duration(duration: Duration) -> String {
    match duration.as_millis() {
        ms if ms < 1000 => format!("{ms}ms"),
        _ => format!("{:.2}s", duration.as_secs_f64()),
    }
}
