//! # 시스템 모듈 테스트
//!
//! 구성 검증, 실행 컨텍스트
//!
//! 로거 설치는 프로세스 전역이므로 `tests/logging_test.rs` 에서 따로 검사한다.
