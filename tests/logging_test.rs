use std::fs;

use log::warn;
use lowrank_diffusion::core::systems::init_logging;
use tempfile::TempDir;

#[test]
fn 로그파일_동시기록_테스트() {
    println!("=== 로그 파일 동시 기록 테스트 ===");
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("run.log");

    init_logging(Some(&path)).unwrap();
    warn!("스텝 0 에서 비유한 손실");
    log::logger().flush();

    let content = fs::read_to_string(&path).unwrap();
    assert!(content.contains("<WARN> 스텝 0 에서 비유한 손실"), "로그 파일 내용: {}", content);

    // 로거는 프로세스당 한 번만 설치됨
    assert!(init_logging(None).is_err());
    println!("✅ 로그 파일: {}", path.display());
}
