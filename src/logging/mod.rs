use std::{thread, time::Duration};

use chrono::{DateTime, Local};
use concat_string::concat_string;
use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use once_cell::sync::Lazy;
use strum::Display;

use crate::logging::rotate::Rotate;

pub mod rotate;

static LOGGER: Lazy<Logger> = Lazy::new(|| Logger::new("default"));

/// 日誌等級
#[derive(Display, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Debug,
    Info,
    Warn,
    Error,
}

pub struct LogMessage {
    pub level: Level,
    pub msg: String,
    pub created_at: DateTime<Local>,
}

impl LogMessage {
    pub fn new(level: Level, msg: String) -> Self {
        LogMessage {
            level,
            msg,
            created_at: Local::now(),
        }
    }

    fn to_line(&self) -> String {
        concat_string!(
            self.created_at.format("%F %X%.6f").to_string(),
            " ",
            self.level.to_string(),
            " ",
            self.msg,
            "\r\n"
        )
    }
}

enum Command {
    Write(LogMessage),
    /// 寫出尚未落檔的內容後回覆
    Flush(Sender<()>),
}

/// 非同步檔案日誌，寫檔交給背景線程處理，呼叫端只負責送出訊息。
pub struct Logger {
    writer: Sender<Command>,
}

impl Logger {
    /// 建立寫入 `log/%Y-%m-%d_{name}.log` 的 logger
    pub fn new(name: &str) -> Self {
        Self::with_pattern(format!("log/%Y-%m-%d_{}.log", name))
    }

    pub fn with_pattern(fn_pattern: String) -> Self {
        let (tx, rx) = unbounded::<Command>();
        let rotate = Rotate::new(fn_pattern);

        //寫入檔案的操作使用另一個線程處理
        thread::spawn(move || Self::write_loop(rotate, rx));

        Logger { writer: tx }
    }

    fn write_loop(mut rotate: Rotate, rx: Receiver<Command>) {
        let mut together = String::with_capacity(4096);
        let mut last_at = Local::now();

        for command in &rx {
            match command {
                Command::Write(received) => {
                    last_at = received.created_at;
                    together.push_str(&received.to_line());
                    if !rx.is_empty() && together.len() < 4096 {
                        continue;
                    }
                }
                Command::Flush(ack) => {
                    Self::write_out(&mut rotate, last_at, &mut together);
                    let _ = ack.send(());
                    continue;
                }
            }

            Self::write_out(&mut rotate, last_at, &mut together);
        }
    }

    fn write_out(rotate: &mut Rotate, at: DateTime<Local>, together: &mut String) {
        if together.is_empty() {
            return;
        }

        if let Err(why) = rotate.write_msg(at, together.as_bytes()) {
            error_console(format!(
                "Failed to write to log file({}). because:{:?}",
                rotate.current_file(),
                why
            ));
        }
        together.clear();
    }

    /// 等待已送出的訊息寫入檔案，最多等待 `timeout`
    pub fn flush(&self, timeout: Duration) {
        let (tx, rx) = bounded::<()>(1);
        if self.writer.send(Command::Flush(tx)).is_ok() {
            let _ = rx.recv_timeout(timeout);
        }
    }

    pub fn debug(&self, log: String) {
        self.send(Level::Debug, log);
    }

    pub fn info(&self, log: String) {
        self.send(Level::Info, log);
    }

    pub fn warn(&self, log: String) {
        self.send(Level::Warn, log);
    }

    pub fn error(&self, log: String) {
        self.send(Level::Error, log);
    }

    fn send(&self, level: Level, msg: String) {
        if level != Level::Debug {
            console(level, &msg);
        }

        if let Err(why) = self.writer.send(Command::Write(LogMessage::new(level, msg))) {
            error_console(why.to_string());
        }
    }
}

pub fn debug_file_async(log: String) {
    LOGGER.debug(log);
}

pub fn info_file_async(log: String) {
    LOGGER.info(log);
}

pub fn warn_file_async(log: String) {
    LOGGER.warn(log);
}

pub fn error_file_async(log: String) {
    LOGGER.error(log);
}

/// 程式結束前呼叫，避免遺失尚未寫入的日誌
pub fn flush() {
    LOGGER.flush(Duration::from_secs(3));
}

pub fn info_console(log: String) {
    console(Level::Info, &log);
}

pub fn error_console(log: String) {
    console(Level::Error, &log);
}

fn console(level: Level, log: &str) {
    println!(
        "{} {} {}",
        Local::now().format("%Y-%m-%d %H:%M:%S.%3f"),
        level,
        log
    );
}
