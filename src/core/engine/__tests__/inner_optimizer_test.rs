use candle_core::{DType, Device, Tensor};

use crate::core::engine::{InnerOptimizer, OptimizeRequest};
use crate::core::matrix::layout::{unflatten_columns, VolumeShape};
use crate::core::systems::{GeneratorKind, ModelParameters, RunContext};

fn 직접_파라미터(rank: usize, lr: f64) -> ModelParameters {
    let mut params = ModelParameters::new(rank);
    params.generator = GeneratorKind::Direct;
    params.learning_rate = lr;
    params
}

/// 0.2 ~ 0.8 범위의 부드러운 경사 볼륨
fn 경사_볼륨(shape: VolumeShape) -> Tensor {
    let (h_len, w_len, d_len, c_len) = shape.dims();
    let span = (h_len + w_len + d_len - 3).max(1) as f32;
    let mut values = Vec::with_capacity(shape.elem_count());
    for h in 0..h_len {
        for w in 0..w_len {
            for d in 0..d_len {
                for _ in 0..c_len {
                    values.push(0.2 + 0.6 * (h + w + d) as f32 / span);
                }
            }
        }
    }
    Tensor::from_vec(values, shape.dims(), &Device::Cpu).unwrap()
}

fn 관측(clean: &Tensor, alpha: f64) -> Tensor {
    (clean.affine(2.0, -1.0).unwrap() * alpha.sqrt()).unwrap()
}

fn 영_평균(shape: VolumeShape) -> Tensor {
    Tensor::zeros(shape.dims(), DType::F32, &Device::Cpu).unwrap()
}

#[test]
fn 업데이트_없음_단일평가_테스트() {
    let shape = VolumeShape::new(3, 3, 2, 1);
    let mut ctx = RunContext::cpu(42);
    let mut optimizer = InnerOptimizer::new(&직접_파라미터(2, 0.01), shape, &mut ctx).unwrap();
    let clean = 경사_볼륨(shape);
    let noisy = 관측(&clean, 0.5);
    let average = 영_평균(shape);

    let before = optimizer.parameter_snapshot().unwrap();
    let expected_recon = unflatten_columns(&optimizer.model().reconstruct().unwrap(), shape).unwrap();

    let outcome = optimizer
        .optimize(&OptimizeRequest {
            noisy: &noisy,
            reference: &clean,
            alpha: 0.5,
            iterations: 25,
            average: &average,
            apply_updates: false,
        })
        .unwrap();

    assert_eq!(outcome.evaluations, 1, "스텝 0 평가 한 번만");
    assert_eq!(outcome.history.len(), 1);
    assert_eq!(outcome.best_step, 0);
    assert_eq!(optimizer.parameter_snapshot().unwrap(), before, "파라미터는 비트 단위로 그대로");

    // 평균 = 0 * 0.98 + recon * 0.02
    let expected_avg = (expected_recon * 0.02).unwrap();
    let diff = (&outcome.average - &expected_avg)
        .unwrap()
        .abs()
        .unwrap()
        .max_keepdim(0)
        .unwrap()
        .flatten_all()
        .unwrap()
        .to_vec1::<f32>()
        .unwrap();
    assert!(diff.iter().all(|v| *v < 1e-6), "반환 평균이 스텝 0 forward 와 달라짐");
    println!("✅ apply_updates = false: 평가 1 회, 파라미터 불변");
}

#[test]
fn 반복횟수_평가수_테스트() {
    let shape = VolumeShape::new(2, 2, 2, 2);
    let mut ctx = RunContext::cpu(1);
    let mut optimizer = InnerOptimizer::new(&직접_파라미터(2, 0.01), shape, &mut ctx).unwrap();
    let clean = 경사_볼륨(shape);
    let noisy = 관측(&clean, 0.7);
    let average = 영_평균(shape);

    let before = optimizer.parameter_snapshot().unwrap();
    let outcome = optimizer
        .optimize(&OptimizeRequest {
            noisy: &noisy,
            reference: &clean,
            alpha: 0.7,
            iterations: 4,
            average: &average,
            apply_updates: true,
        })
        .unwrap();

    assert_eq!(outcome.evaluations, 5, "iterations + 1 번 평가");
    assert_eq!(outcome.skipped_updates, 0);
    let steps: Vec<usize> = outcome.history.iter().map(|r| r.step).collect();
    assert_eq!(steps, vec![0, 1, 2, 3, 4]);
    assert_ne!(optimizer.parameter_snapshot().unwrap(), before);
    assert_eq!(outcome.history[0].relative_residual, None, "0 평균에서 시작하면 첫 변화량 없음");

    let clipped = outcome.averaged_reconstruction.flatten_all().unwrap().to_vec1::<f32>().unwrap();
    assert!(clipped.iter().all(|v| (0.0..=1.0).contains(v)), "평균 재구성은 [0, 1] 로 잘림");
}

#[test]
fn 손실_감소_테스트() {
    let shape = VolumeShape::new(4, 4, 4, 1);
    let mut params = ModelParameters::new(2);
    params.image_channels = vec![4, 4];
    params.mask_hidden = vec![8];
    params.learning_rate = 0.01;
    let mut ctx = RunContext::cpu(5);
    let mut optimizer = InnerOptimizer::new(&params, shape, &mut ctx).unwrap();
    let clean = 경사_볼륨(shape);
    let noisy = 관측(&clean, 0.8);
    let average = 영_평균(shape);

    let outcome = optimizer
        .optimize(&OptimizeRequest {
            noisy: &noisy,
            reference: &clean,
            alpha: 0.8,
            iterations: 30,
            average: &average,
            apply_updates: true,
        })
        .unwrap();

    let first = outcome.history.first().unwrap().losses.total;
    let last = outcome.history.last().unwrap().losses.total;
    assert!(last < first, "딥 프라이어 손실이 줄어야 함: {} → {}", first, last);
    println!("✅ 딥 프라이어 손실 {:.5} → {:.5}", first, last);
}

#[test]
fn 비유한_손실_업데이트_건너뜀_테스트() {
    let shape = VolumeShape::new(2, 2, 2, 1);
    let mut ctx = RunContext::cpu(8);
    let mut optimizer = InnerOptimizer::new(&직접_파라미터(1, 0.01), shape, &mut ctx).unwrap();
    let clean = 경사_볼륨(shape);
    let average = 영_평균(shape);

    // 관측에 NaN → 손실과 그래디언트가 NaN
    let mut values = vec![0.0f32; shape.elem_count()];
    values[3] = f32::NAN;
    let noisy = Tensor::from_vec(values, shape.dims(), &Device::Cpu).unwrap();

    let before = optimizer.parameter_snapshot().unwrap();
    let outcome = optimizer
        .optimize(&OptimizeRequest {
            noisy: &noisy,
            reference: &clean,
            alpha: 0.5,
            iterations: 3,
            average: &average,
            apply_updates: true,
        })
        .unwrap();

    assert_eq!(outcome.skipped_updates, 4);
    assert!(outcome.history.iter().all(|r| r.update_skipped));
    assert!(outcome.history[0].losses.total.is_nan());
    assert_eq!(optimizer.parameter_snapshot().unwrap(), before, "비유한 스텝에서는 업데이트 없음");
}

#[test]
fn 입력_검증_테스트() {
    let shape = VolumeShape::new(2, 2, 2, 1);
    let mut ctx = RunContext::cpu(2);
    let mut optimizer = InnerOptimizer::new(&직접_파라미터(1, 0.01), shape, &mut ctx).unwrap();
    let clean = 경사_볼륨(shape);
    let average = 영_평균(shape);

    let (clean_ref, average_ref) = (&clean, &average);
    let request = move |alpha: f64| OptimizeRequest {
        noisy: clean_ref,
        reference: clean_ref,
        alpha,
        iterations: 1,
        average: average_ref,
        apply_updates: true,
    };
    assert!(optimizer.optimize(&request(0.0)).is_err());
    assert!(optimizer.optimize(&request(1.5)).is_err());
    assert!(optimizer.optimize(&request(f64::NAN)).is_err());

    let other_shape = VolumeShape::new(2, 2, 3, 1);
    let other = 경사_볼륨(other_shape);
    let mismatched = OptimizeRequest {
        noisy: &other,
        reference: &other,
        alpha: 0.5,
        iterations: 1,
        average: &average,
        apply_updates: true,
    };
    assert!(optimizer.optimize(&mismatched).is_err(), "모델과 다른 형태는 거부");
}

#[test]
fn 추적_호출간_유지와_초기화_테스트() {
    let shape = VolumeShape::new(3, 2, 2, 1);
    let mut ctx = RunContext::cpu(13);
    let mut optimizer = InnerOptimizer::new(&직접_파라미터(1, 0.05), shape, &mut ctx).unwrap();
    let clean = 경사_볼륨(shape);
    let noisy = 관측(&clean, 0.6);
    let average = 영_평균(shape);
    let request = OptimizeRequest {
        noisy: &noisy,
        reference: &clean,
        alpha: 0.6,
        iterations: 5,
        average: &average,
        apply_updates: true,
    };

    let first = optimizer.optimize(&request).unwrap();
    let second = optimizer.optimize(&request).unwrap();
    assert!(second.best_quality >= first.best_quality, "최고 기록은 호출 간에 유지");

    optimizer.reset_tracking();
    assert!(optimizer.tracker().best_averaged().is_none());

    let before = optimizer.parameter_snapshot().unwrap();
    optimizer.reinitialize(&mut ctx).unwrap();
    assert_ne!(optimizer.parameter_snapshot().unwrap(), before, "재초기화는 새 파라미터");
    assert_eq!(optimizer.model().rank(), 1);
    assert_eq!(optimizer.shape(), shape);
}
