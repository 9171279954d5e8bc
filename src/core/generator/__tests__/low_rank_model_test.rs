use crate::core::generator::LowRankImageModel;
use crate::core::matrix::layout::VolumeShape;
use crate::core::systems::{GeneratorKind, ModelParameters, RunContext};

fn 작은_딥프라이어(rank: usize) -> ModelParameters {
    let mut params = ModelParameters::new(rank);
    params.image_channels = vec![2];
    params.mask_hidden = vec![4];
    params
}

fn 직접_인자(rank: usize) -> ModelParameters {
    let mut params = ModelParameters::new(rank);
    params.generator = GeneratorKind::Direct;
    params
}

#[test]
fn 인자_형태_테스트() {
    for (rank, shape) in [
        (1, VolumeShape::new(2, 2, 2, 1)),
        (3, VolumeShape::new(4, 3, 2, 2)),
        (2, VolumeShape::new(5, 1, 3, 4)),
    ] {
        for params in [작은_딥프라이어(rank), 직접_인자(rank)] {
            let mut ctx = RunContext::cpu(1);
            let model = LowRankImageModel::new(&params, shape, &mut ctx).unwrap();

            assert_eq!(model.rank(), rank);
            assert_eq!(model.image_factors().unwrap().dims(), &[shape.pixels(), rank]);
            assert_eq!(model.mask_factors().unwrap().dims(), &[rank, shape.channels]);
            assert_eq!(
                model.reconstruct().unwrap().dims(),
                &[shape.pixels(), shape.channels]
            );
        }
    }
    println!("✅ 이미지 인자 rank 열, 마스크 인자 rank 행 확인");
}

#[test]
fn 랭크0_거부_테스트() {
    let mut ctx = RunContext::cpu(1);
    let result = LowRankImageModel::new(&직접_인자(0), VolumeShape::new(2, 2, 2, 1), &mut ctx);
    assert!(result.is_err());
}

#[test]
fn 파라미터_순서_테스트() {
    // 직접 인자: 랭크 2 → 이미지 2 개, 마스크 2 개
    let shape = VolumeShape::new(2, 3, 4, 2);
    let mut ctx = RunContext::cpu(9);
    let model = LowRankImageModel::new(&직접_인자(2), shape, &mut ctx).unwrap();
    let vars = model.vars();

    assert_eq!(vars.len(), 4);
    assert_eq!(vars[0].as_tensor().dims(), &[1, 2, 3, 4]);
    assert_eq!(vars[1].as_tensor().dims(), &[1, 2, 3, 4]);
    assert_eq!(vars[2].as_tensor().dims(), &[1, 2]);
    assert_eq!(model.parameter_count(), 2 * 24 + 2 * 2);
}

#[test]
fn 재초기화_잠재입력_유지_테스트() {
    let shape = VolumeShape::new(3, 3, 3, 1);
    let mut ctx = RunContext::cpu(21);
    let mut model = LowRankImageModel::new(&작은_딥프라이어(2), shape, &mut ctx).unwrap();

    let before = model.vars()[0].as_tensor().flatten_all().unwrap().to_vec1::<f32>().unwrap();
    model.rebuild_components(&mut ctx).unwrap();
    let after = model.vars()[0].as_tensor().flatten_all().unwrap().to_vec1::<f32>().unwrap();

    assert_ne!(before, after, "생성기 파라미터는 새로 뽑힌다");
    assert_eq!(model.rank(), 2);
    assert_eq!(model.blueprint().kind, GeneratorKind::DeepPrior);
}

#[test]
fn 재구성_그래디언트_연결_테스트() {
    let shape = VolumeShape::new(2, 2, 2, 2);
    let mut ctx = RunContext::cpu(3);
    let model = LowRankImageModel::new(&작은_딥프라이어(2), shape, &mut ctx).unwrap();
    let loss = model.reconstruct().unwrap().sqr().unwrap().sum_all().unwrap();
    let grads = loss.backward().unwrap();

    let missing = model
        .vars()
        .iter()
        .filter(|var| grads.get(var.as_tensor()).is_none())
        .count();
    assert_eq!(missing, 0, "모든 생성기 파라미터가 재구성에 연결되어야 함");
}
