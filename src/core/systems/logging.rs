//! # 로거 초기화
//!
//! 콘솔(stderr)과 로그 파일에 동시에 기록하는 env_logger 설정.
//! 코어는 `log` 매크로만 사용하고, 싱크 설치는 바이너리가 담당한다.

use anyhow::{Context, Result};
use env_logger::{Builder, Env, Target};
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

/// stderr + 파일 동시 기록
struct TeeWriter {
    file: File,
}

impl Write for TeeWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::stderr().write_all(buf)?;
        self.file.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()?;
        self.file.flush()
    }
}

/// 로거 설치. `RUST_LOG` 가 없으면 info 레벨.
pub fn init_logging(log_file: Option<&Path>) -> Result<()> {
    let mut builder = Builder::from_env(Env::default().default_filter_or("info"));
    builder.format(|buf, record| {
        writeln!(
            buf,
            "{} : <{}> {}",
            chrono::Local::now().format("%y-%m-%d %H:%M:%S%.3f"),
            record.level(),
            record.args()
        )
    });

    if let Some(path) = log_file {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("로그 파일 열기 실패: {:?}", path))?;
        builder.target(Target::Pipe(Box::new(TeeWriter { file })));
    }

    builder.try_init().context("로거가 이미 설치되어 있음")?;
    Ok(())
}
