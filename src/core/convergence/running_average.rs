use anyhow::{bail, Result};
use candle_core::{DType, Tensor};

/// 재구성의 지수 이동 평균 + 상대 변화량
///
/// `avg_t = avg_{t-1} * decay + recon_t * (1 - decay)`
/// `res = ||avg_t - prev|| / ||prev||`, 직전 평균의 노름이 0 이면 `None`.
/// NaN 은 정제하지 않으므로 한 번 들어오면 이후 평균에 계속 남는다.
#[derive(Debug, Clone)]
pub struct RunningAverageEstimator {
    average: Tensor,
    previous: Tensor,
    decay: f64,
}

impl RunningAverageEstimator {
    /// 평균과 직전값 모두 0 으로 시작
    pub fn new(zeros: Tensor, decay: f64) -> Result<Self> {
        if !(0.0..1.0).contains(&decay) {
            bail!("감쇠 계수는 [0, 1) 범위여야 함: {}", decay);
        }
        Ok(Self {
            average: zeros.clone(),
            previous: zeros,
            decay,
        })
    }

    pub fn decay(&self) -> f64 {
        self.decay
    }

    pub fn average(&self) -> &Tensor {
        &self.average
    }

    pub fn previous(&self) -> &Tensor {
        &self.previous
    }

    /// 호출자가 이어받은 평균을 주입. `previous` 는 유지된다.
    pub fn set_average(&mut self, average: &Tensor) -> Result<()> {
        if average.dims() != self.average.dims() {
            bail!(
                "평균 형태 {:?} 가 기대 형태 {:?} 와 다름",
                average.dims(),
                self.average.dims()
            );
        }
        self.average = average.detach();
        Ok(())
    }

    /// 새 재구성으로 갱신 → (평균, 상대 변화량)
    pub fn update(&mut self, reconstruction: &Tensor) -> Result<(Tensor, Option<f32>)> {
        let weighted_old = (&self.average * self.decay)?;
        let weighted_new = (reconstruction.detach() * (1.0 - self.decay))?;
        self.average = (weighted_old + weighted_new)?;

        let residual = relative_change(&self.average, &self.previous)?;
        self.previous = self.average.clone();
        Ok((self.average.clone(), residual))
    }
}

/// ||current - previous|| / ||previous||
pub fn relative_change(current: &Tensor, previous: &Tensor) -> Result<Option<f32>> {
    let denom = previous
        .sqr()?
        .sum_all()?
        .to_dtype(DType::F64)?
        .to_scalar::<f64>()?;
    if denom == 0.0 {
        return Ok(None);
    }
    let numer = (current - previous)?
        .sqr()?
        .sum_all()?
        .to_dtype(DType::F64)?
        .to_scalar::<f64>()?;
    Ok(Some((numer / denom).sqrt() as f32))
}
