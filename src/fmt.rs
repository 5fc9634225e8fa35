/// Where [`Logger`] writes to.
#[derive(Debug, Clone)]
pub enum LogOutput {
    Log(log::Level),
    LogTarget(log::Level, String),
    StdOut,
    StdErr,
    #[cfg(feature = "log-to-file")]
    File(std::sync::Arc<parking_lot::Mutex<std::fs::File>>),
}

impl From<log::Level> for LogOutput {
    fn from(value: log::Level) -> Self {
        Self::Log(value)
    }
}

impl LogOutput {
    fn print(&self, msg: &str) {
        match self {
            LogOutput::Log(level) => log::log!(*level, "{}", msg),
            LogOutput::LogTarget(level, target) => {
                log::log!(target: target, *level, "{}", msg)
            }
            LogOutput::StdOut => println!("{}", msg),
            LogOutput::StdErr => eprintln!("{}", msg),
            #[cfg(feature = "log-to-file")]
            LogOutput::File(file) => {
                use std::io::Write;

                let mut file = file.lock();
                file.write_all(msg.as_bytes()).ok();
                file.write_all(b"\n").ok();
            }
        }
    }
}

/// A single line of log output: a title at some indentation level,
/// optionally followed by a value.
#[derive(Debug, Clone, PartialEq)]
pub struct LogItem {
    level: usize,
    title: String,
    value: Option<String>,
}

impl LogItem {
    pub fn new<T: Into<String>, V: Into<String>>(level: usize, title: T, value: Option<V>) -> Self {
        Self {
            level,
            title: title.into(),
            value: value.map(Into::into),
        }
    }

    /// Move this item one level deeper, to nest it under another item.
    pub fn indented(mut self) -> Self {
        self.level += 1;
        self
    }
}

impl<T: ToString, V: ToString> From<(usize, T, V)> for LogItem {
    fn from((level, title, value): (usize, T, V)) -> Self {
        let value = value.to_string();
        let value = if value.is_empty() { None } else { Some(value) };
        Self::new(level, title.to_string(), value)
    }
}

impl<T: ToString> From<(usize, T)> for LogItem {
    fn from((level, value): (usize, T)) -> Self {
        Self::new::<_, String>(level, value.to_string(), None)
    }
}

pub struct Logger;

impl Logger {
    pub fn log<T>(output: &LogOutput, loggable: &T)
    where
        T: Loggable,
    {
        Self::lines(&loggable.as_log())
            .iter()
            .for_each(|line| output.print(line))
    }

    /// Render `items` into lines.
    ///
    /// Values of consecutive items on the same level are aligned.
    pub fn lines(items: &[LogItem]) -> Vec<String> {
        let mut lines = Vec::with_capacity(items.len());

        let mut idx = 0;
        while idx < items.len() {
            let level = items[idx].level;

            let run = items[idx..]
                .iter()
                .take_while(|i| i.level == level && i.value.is_some())
                .count()
                .max(1);

            let run = &items[idx..idx + run];

            let right_align = run.iter().map(|i| i.title.len()).max().unwrap_or(0);

            for LogItem {
                level,
                title,
                value,
            } in run
            {
                let front_padding = " ".repeat(level * 2);

                let line = match value {
                    Some(value) => {
                        let value_padding = " ".repeat(right_align - title.len());
                        format!("{front_padding}{title}: {value_padding}{value}")
                    }
                    None => format!("{front_padding}{title}"),
                };

                lines.push(line);
            }

            idx += run.len();
        }

        lines
    }
}

pub trait Loggable {
    fn as_log(&self) -> Vec<LogItem>;
}

#[macro_export]
macro_rules ! log_vec {
    [$($msg:tt)*] => {
        $crate::to_log!(vec: $($msg)*)
    }
}

#[macro_export]
macro_rules! to_log {
    ([$($array:tt)*],) => {
        vec![$($array)*]
    };

    ([$($array:tt)*], ($level:literal, $title:expr, $value:expr)) => {
        $crate::to_log!([$($array)* ($level, $title, $value).into(),],)
    };

    ([$($array:tt)*], ($level:literal, $title:expr)) => {
        $crate::to_log!([$($array)* ($level, $title, "").into(),],)
    };

    ([$($array:tt)*], ($level:literal, $title:expr, $value:expr), $($msg:tt)*) => {
        $crate::to_log!([$($array)* ($level, $title, $value).into(),], $($msg)*)
    };

    ([$($array:tt)*], ($level:literal, $title:expr), $($msg:tt)*) => {
        $crate::to_log!([$($array)* ($level, $title, "").into(),], $($msg)*)
    };

    (vec: $($msg:tt)*) => {
        $crate::to_log!([], $($msg)*)
    };
}
