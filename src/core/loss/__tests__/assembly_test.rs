use approx::assert_relative_eq;
use candle_core::{DType, Device, Tensor, Var};

use crate::core::loss::LossAssembly;
use crate::core::matrix::layout::{to_batched_channels_first, unflatten_columns, VolumeShape};
use crate::core::systems::RunContext;

struct LossInput {
    var: Var,
    observed: Tensor,
    shape: VolumeShape,
}

fn 입력_준비(seed: u64) -> LossInput {
    let shape = VolumeShape::new(3, 2, 2, 2);
    let mut ctx = RunContext::cpu(seed);
    let var = Var::from_tensor(&ctx.uniform((shape.pixels(), shape.channels), -1.0, 1.0).unwrap()).unwrap();
    let observed = ctx.normal((shape.pixels(), shape.channels), 0.5).unwrap();
    LossInput { var, observed, shape }
}

fn 배치(flat: &Tensor, shape: VolumeShape) -> Tensor {
    to_batched_channels_first(&unflatten_columns(flat, shape).unwrap()).unwrap()
}

fn 그래디언트(loss: &Tensor, var: &Var) -> Vec<f32> {
    let grads = loss.backward().unwrap();
    grads
        .get(var.as_tensor())
        .unwrap()
        .flatten_all()
        .unwrap()
        .to_vec1::<f32>()
        .unwrap()
}

#[test]
fn KL항_그래디언트_제외_테스트() {
    let input = 입력_준비(1);
    let assembly = LossAssembly::new(0.3).unwrap();
    let recon = input.var.as_tensor();
    let batched = 배치(recon, input.shape);

    let breakdown = assembly.assemble(recon, &batched, &input.observed, 0.6).unwrap();
    let baseline = 그래디언트(&breakdown.total, &input.var);

    // KL 항을 크게 섞어도 그래디언트는 비트 단위로 같아야 한다
    let perturbed_total = (&breakdown.total + (&breakdown.residual_distribution * 1000.0).unwrap()).unwrap();
    let perturbed = 그래디언트(&perturbed_total, &input.var);
    assert_eq!(baseline, perturbed, "KL 항이 역전파에 섞임");

    // combine 으로 다시 만든 total 도 동일
    let recombined = assembly
        .combine(&breakdown.reconstruction, breakdown.smoothness.as_ref())
        .unwrap();
    assert_eq!(baseline, 그래디언트(&recombined, &input.var));
    println!("✅ KL 항은 진단 전용");
}

#[test]
fn beta0_평활항_생략_테스트() {
    let input = 입력_준비(2);
    let assembly = LossAssembly::new(0.0).unwrap();
    let recon = input.var.as_tensor();
    let batched = 배치(recon, input.shape);

    let breakdown = assembly.assemble(recon, &batched, &input.observed, 0.5).unwrap();
    assert!(breakdown.smoothness.is_none(), "beta = 0 이면 TV 를 계산하지 않음");

    let values = breakdown.values().unwrap();
    assert_eq!(values.total, values.reconstruction);
    assert_eq!(values.smoothness, 0.0);
}

#[test]
fn 총손실_합성_테스트() {
    let input = 입력_준비(3);
    let assembly = LossAssembly::new(0.5).unwrap();
    let recon = input.var.as_tensor();
    let batched = 배치(recon, input.shape);

    let values = assembly
        .assemble(recon, &batched, &input.observed, 0.5)
        .unwrap()
        .values()
        .unwrap();
    assert!(values.smoothness > 0.0);
    assert_relative_eq!(
        values.total,
        values.reconstruction + 0.5 * values.smoothness,
        epsilon = 1e-5
    );
    assert!(values.residual_distribution.is_finite());
}

#[test]
fn 잔차_공식_테스트() {
    // et = (y - sqrt(a) x) / sqrt(1 - a), a = 0.36 → (1 - 0.6 * 0.5) / 0.8 = 0.875
    let observed = Tensor::ones((2, 1), DType::F32, &Device::Cpu).unwrap();
    let recon = Tensor::full(0.5f32, (2, 1), &Device::Cpu).unwrap();
    let et = LossAssembly::residual(&observed, &recon, 0.36).unwrap();
    for value in et.flatten_all().unwrap().to_vec1::<f32>().unwrap() {
        assert_relative_eq!(value, 0.875, epsilon = 1e-5);
    }
}

#[test]
fn 음수_beta_거부_테스트() {
    assert!(LossAssembly::new(-0.1).is_err());
    assert!(LossAssembly::new(f64::NAN).is_err());
    assert_eq!(LossAssembly::new(0.25).unwrap().beta(), 0.25);
}
