use approx::assert_relative_eq;

use crate::core::engine::{NoiseSchedule, SamplingPlan};
use crate::core::systems::{DiffusionParameters, IterationSchedule};

#[test]
fn 선형스케줄_단조감소_테스트() {
    let schedule = NoiseSchedule::linear(1e-4, 0.02, 1000).unwrap();
    let alphas = schedule.alphas_cumprod();

    assert_eq!(schedule.len(), 1000);
    assert_relative_eq!(alphas[0], 1.0 - 1e-4, epsilon = 1e-12);
    assert!(alphas.windows(2).all(|pair| pair[1] < pair[0]), "누적 알파는 감소해야 함");
    assert!(alphas.iter().all(|a| *a > 0.0 && *a < 1.0));
    assert!(alphas[999] < 1e-4, "마지막 알파는 거의 0: {}", alphas[999]);
    println!("✅ 선형 스케줄: a[0]={:.6}, a[999]={:.3e}", alphas[0], alphas[999]);
}

#[test]
fn 스케줄_입력검증_테스트() {
    assert!(NoiseSchedule::linear(0.0, 0.02, 10).is_err());
    assert!(NoiseSchedule::linear(0.03, 0.02, 10).is_err());
    assert!(NoiseSchedule::linear(1e-4, 0.02, 0).is_err());
    assert!(NoiseSchedule::from_alphas_cumprod(vec![]).is_err());
    assert!(NoiseSchedule::from_alphas_cumprod(vec![0.9, 0.0]).is_err());

    let schedule = NoiseSchedule::from_alphas_cumprod(vec![0.9, 0.5]).unwrap();
    assert_eq!(schedule.alpha(1).unwrap(), 0.5);
    assert!(schedule.alpha(2).is_err());
}

#[test]
fn 구성_스케줄_선택_테스트() {
    let mut params = DiffusionParameters::default();
    assert_eq!(NoiseSchedule::from_config(&params).unwrap().len(), 1000);

    params.alphas_cumprod = Some(vec![0.99, 0.9, 0.8]);
    let schedule = NoiseSchedule::from_config(&params).unwrap();
    assert_eq!(schedule.alphas_cumprod(), &[0.99, 0.9, 0.8]);
}

#[test]
fn 노이즈수준_시작점_테스트() {
    let schedule = NoiseSchedule::from_alphas_cumprod(vec![0.99, 0.9, 0.5, 0.2]).unwrap();
    assert_eq!(schedule.start_for_noise_level(0.0), 0, "노이즈 0 이면 첫 타임스텝");
    // σ = 0.5 → 1 / (1 + 1) = 0.5
    assert_eq!(schedule.start_for_noise_level(0.5), 2);
    // σ = 1 → 0.2
    assert_eq!(schedule.start_for_noise_level(1.0), 3);

    let linear = NoiseSchedule::linear(1e-4, 0.02, 1000).unwrap();
    let start = linear.start_for_noise_level(0.1);
    let target = 1.0 / (1.0 + 4.0 * 0.01);
    let alpha = linear.alpha(start).unwrap();
    assert!((alpha - target).abs() < 0.01, "alpha {} 가 목표 {} 에 가까워야 함", alpha, target);
}

#[test]
fn 샘플링_계획_테스트() {
    let plan = SamplingPlan::new(999, 20, &IterationSchedule::Fixed(10)).unwrap();
    assert_eq!(plan.len(), 20);
    assert_eq!(plan.timesteps[0], 999);
    assert_eq!(plan.timesteps[1], 950, "skip = 999 / 20 = 49");
    assert_eq!(plan.timesteps[19], 999 - 19 * 49);
    assert_eq!(plan.iterations, vec![10; 20]);
    assert_eq!(plan.total_evaluations(), 20 * 11);

    // 시작점이 스텝 수보다 작으면 skip = 1, 0 에서 멈춘다
    let short = SamplingPlan::new(3, 10, &IterationSchedule::PerStep((1..=10).collect())).unwrap();
    assert_eq!(short.timesteps, vec![3, 2, 1, 0]);
    assert_eq!(short.iterations, vec![1, 2, 3, 4]);
    assert!(!short.is_empty());
}

#[test]
fn 샘플링_계획_오류_테스트() {
    assert!(SamplingPlan::new(10, 0, &IterationSchedule::Fixed(1)).is_err());
    let err = SamplingPlan::new(10, 3, &IterationSchedule::PerStep(vec![1, 2])).unwrap_err();
    assert_eq!(err.field(), Some("model.iter_number"));
}
