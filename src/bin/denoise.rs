use anyhow::{Context, Result};
use clap::{value_parser, Arg, ArgMatches, Command};
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info, warn};
use std::fs;
use std::path::PathBuf;
use std::process;
use std::time::Instant;

use lowrank_diffusion::core::io::{prepare_volumes, write_artifacts, RunSummary};
use lowrank_diffusion::core::matrix::quality::{clipped_psnr, QualityLevel};
use lowrank_diffusion::core::systems::init_logging;
use lowrank_diffusion::{
    psnr, DenoiseConfig, DiffusionSampler, InnerOptimizer, ModelParameters, RunContext, VolumeShape,
};

fn main() {
    let matches = Command::new("denoise")
        .version("0.1.0")
        .about("저랭크 딥 프라이어 확산 디노이저")
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .value_name("FILE")
                .help("JSON 구성 파일 (없으면 기본값 + --rank)"),
        )
        .arg(
            Arg::new("exp")
                .long("exp")
                .value_name("DIR")
                .help("출력 디렉토리 (runtime.output_dir 덮어쓰기)"),
        )
        .arg(
            Arg::new("name")
                .long("name")
                .value_name("NAME")
                .help("로거 / 결과 파일 이름"),
        )
        .arg(
            Arg::new("seed")
                .long("seed")
                .value_name("SEED")
                .value_parser(value_parser!(u64))
                .help("난수 시드"),
        )
        .arg(
            Arg::new("rank")
                .long("rank")
                .short('r')
                .value_name("RANK")
                .value_parser(value_parser!(usize))
                .help("랭크 성분 개수"),
        )
        .arg(
            Arg::new("beta")
                .long("beta")
                .value_name("BETA")
                .value_parser(value_parser!(f64))
                .help("TV 정규화 가중치"),
        )
        .arg(
            Arg::new("timesteps")
                .long("timesteps")
                .short('t')
                .value_name("STEPS")
                .value_parser(value_parser!(usize))
                .help("샘플링 스텝 수"),
        )
        .arg(
            Arg::new("start-point")
                .long("start-point")
                .value_name("T")
                .value_parser(value_parser!(usize))
                .help("시작 타임스텝"),
        )
        .arg(
            Arg::new("sigma")
                .long("sigma")
                .value_name("SIGMA")
                .value_parser(value_parser!(f64))
                .help("관측 노이즈 표준편차 ([0,1] 스케일)"),
        )
        .arg(
            Arg::new("eta")
                .long("eta")
                .value_name("ETA")
                .value_parser(value_parser!(f64))
                .help("DDIM eta"),
        )
        .get_matches();

    if let Err(err) = run(&matches) {
        // 설정 단계에서 실패하면 아직 로거가 없다. 이미 있으면 무시된다.
        let _ = init_logging(None);
        error!("❌ 오류: {:#}", err);
        process::exit(1);
    }
}

fn run(matches: &ArgMatches) -> Result<()> {
    let mut config = match matches.get_one::<String>("config") {
        Some(path) => DenoiseConfig::load(&PathBuf::from(path))?,
        None => DenoiseConfig::new(ModelParameters::new(1)),
    };
    apply_overrides(&mut config, matches);
    config.validate()?;

    let runtime = &config.runtime;
    fs::create_dir_all(&runtime.output_dir)
        .with_context(|| format!("출력 디렉토리 생성 실패: {}", runtime.output_dir.display()))?;
    let log_path = runtime.output_dir.join(format!("{}.log", runtime.logger_name));
    init_logging(Some(&log_path))?;

    info!("🚀 디노이징 시작: {}", runtime.logger_name);
    info!("구성: {}", serde_json::to_string(&config)?);

    let mut ctx = RunContext::from_kind(runtime.device, runtime.seed)?;
    info!("디바이스: {:?}, 시드: {}", ctx.device(), ctx.seed());

    let (clean, noisy) = prepare_volumes(&config, &mut ctx)?;
    let shape = VolumeShape::of(&clean)?;
    let noisy_psnr = psnr(&clean, &noisy)?;
    info!(
        "볼륨 {:?}, 관측 PSNR {:.4} dB ({:?})",
        shape.dims(),
        noisy_psnr,
        QualityLevel::from_psnr(noisy_psnr)
    );

    let sampler = DiffusionSampler::from_config(&config)?;
    let mut optimizer = InnerOptimizer::new(&config.model, shape, &mut ctx)?;
    info!(
        "랭크 {}, 파라미터 {} 개, 총 평가 {} 회",
        optimizer.model().rank(),
        optimizer.model().parameter_count(),
        sampler.plan().total_evaluations()
    );

    let progress = ProgressBar::new(sampler.plan().len() as u64);
    progress.set_style(
        ProgressStyle::default_bar()
            .template("🔥 [{elapsed_precise}] [{bar:40.cyan/blue}] {pos:>3}/{len:3} {msg}")?
            .progress_chars("##-"),
    );

    let started = Instant::now();
    let outcome = sampler.sample(&mut optimizer, &noisy, &clean, &mut ctx, Some(&progress))?;
    progress.finish_with_message("완료");
    let total_seconds = started.elapsed().as_secs_f64();

    let final_psnr = clipped_psnr(&clean, &outcome.final_estimate)?;
    if final_psnr < noisy_psnr {
        warn!(
            "최종 추정 PSNR {:.4} 가 관측 PSNR {:.4} 보다 낮음",
            final_psnr, noisy_psnr
        );
    }
    info!(
        "🏆 최고 PSNR {:.4} dB ({:?}), 확산 스텝 {} / 내부 반복 {}, 최종 PSNR {:.4}, {:.2}초",
        outcome.best_psnr,
        QualityLevel::from_psnr(outcome.best_psnr),
        outcome.best_diffusion_step,
        outcome.best_inner_step,
        final_psnr,
        total_seconds
    );

    let summary = RunSummary::from_outcome(
        &runtime.logger_name,
        runtime.seed,
        config.model.rank,
        &outcome,
        total_seconds,
    )
    .with_final_psnr(final_psnr)
    .with_noisy_psnr(noisy_psnr);
    write_artifacts(&runtime.output_dir, &runtime.logger_name, &outcome, &summary)?;
    Ok(())
}

fn apply_overrides(config: &mut DenoiseConfig, matches: &ArgMatches) {
    if let Some(dir) = matches.get_one::<String>("exp") {
        config.runtime.output_dir = PathBuf::from(dir);
    }
    if let Some(name) = matches.get_one::<String>("name") {
        config.runtime.logger_name = name.clone();
    }
    if let Some(&seed) = matches.get_one::<u64>("seed") {
        config.runtime.seed = seed;
    }
    if let Some(&rank) = matches.get_one::<usize>("rank") {
        config.model.rank = rank;
    }
    if let Some(&beta) = matches.get_one::<f64>("beta") {
        config.model.beta = beta;
    }
    if let Some(&timesteps) = matches.get_one::<usize>("timesteps") {
        config.diffusion.timesteps = timesteps;
    }
    if let Some(&start) = matches.get_one::<usize>("start-point") {
        config.diffusion.start_point = Some(start);
    }
    if let Some(&sigma) = matches.get_one::<f64>("sigma") {
        config.data.noise_sigma = sigma;
    }
    if let Some(&eta) = matches.get_one::<f64>("eta") {
        config.diffusion.eta = eta;
    }
}
