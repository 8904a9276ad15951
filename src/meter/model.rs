//! Degree-day regression of average daily usage against temperature.
//!
//! `usage/day = base + hs·max(0, hbt − T) + cs·max(0, T − cbt)`
//!
//! Balance temperatures are chosen by grid search; at each grid point the
//! intercept and slopes are fit by ordinary least squares. Slopes are never
//! negative: a term whose slope would be negative is dropped from the fit.

use serde::{Deserialize, Serialize};

use crate::config::MeterConfig;
use crate::models::FuelType;

/// Fitted coefficients; absent terms do not contribute to predictions
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelParameters {
    pub base_daily_consumption: f64,
    pub heating_slope: Option<f64>,
    pub heating_balance_temperature: Option<f64>,
    pub cooling_slope: Option<f64>,
    pub cooling_balance_temperature: Option<f64>,
}

impl ModelParameters {
    pub fn predict(&self, temperature_f: f64) -> f64 {
        let mut usage = self.base_daily_consumption;
        if let (Some(slope), Some(balance)) = (self.heating_slope, self.heating_balance_temperature) {
            usage += slope * (balance - temperature_f).max(0.0);
        }
        if let (Some(slope), Some(balance)) = (self.cooling_slope, self.cooling_balance_temperature) {
            usage += slope * (temperature_f - balance).max(0.0);
        }
        usage
    }

    /// Daily predictions; days without a temperature predict NaN
    pub fn transform(&self, temperatures: &[Option<f64>]) -> Vec<f64> {
        temperatures
            .iter()
            .map(|t| t.map_or(f64::NAN, |t| self.predict(t)))
            .collect()
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Average daily usage over a period with the temperatures observed in it
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub daily_usage: f64,
    pub temperatures: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelFit {
    pub parameters: ModelParameters,
    /// Coefficient of variation of the RMSE, in percent
    pub cvrmse: Option<f64>,
    pub n: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TemperatureSensitivityModel {
    pub heating: bool,
    pub cooling: bool,
    heating_candidates: Vec<f64>,
    cooling_candidates: Vec<f64>,
}

impl TemperatureSensitivityModel {
    pub fn new(heating: bool, cooling: bool, config: &MeterConfig) -> Self {
        Self {
            heating,
            cooling,
            heating_candidates: config.heating_balance_temperature.candidates(),
            cooling_candidates: config.cooling_balance_temperature.candidates(),
        }
    }

    /// Electricity responds to heating and cooling; natural gas to heating only
    pub fn for_fuel(fuel_type: FuelType, config: &MeterConfig) -> Self {
        match fuel_type {
            FuelType::Electricity => Self::new(true, true, config),
            FuelType::NaturalGas => Self::new(true, false, config),
        }
    }

    /// Best fit over the balance temperature grid, or `None` without usable data
    pub fn fit(&self, observations: &[Observation]) -> Option<ModelFit> {
        let observations: Vec<&Observation> = observations
            .iter()
            .filter(|o| o.daily_usage.is_finite() && !o.temperatures.is_empty())
            .collect();
        if observations.is_empty() {
            return None;
        }

        let heating_grid: Vec<Option<f64>> = if self.heating {
            self.heating_candidates.iter().copied().map(Some).collect()
        } else {
            vec![None]
        };
        let cooling_grid: Vec<Option<f64>> = if self.cooling {
            self.cooling_candidates.iter().copied().map(Some).collect()
        } else {
            vec![None]
        };

        let usage: Vec<f64> = observations.iter().map(|o| o.daily_usage).collect();
        let mut best: Option<(f64, usize, ModelParameters)> = None;

        for hbt in &heating_grid {
            for cbt in &cooling_grid {
                if let (Some(h), Some(c)) = (hbt, cbt) {
                    if h > c {
                        continue;
                    }
                }

                let hdd: Option<Vec<f64>> = hbt.map(|b| {
                    observations
                        .iter()
                        .map(|o| mean(o.temperatures.iter().map(|t| (b - t).max(0.0))))
                        .collect()
                });
                let cdd: Option<Vec<f64>> = cbt.map(|b| {
                    observations
                        .iter()
                        .map(|o| mean(o.temperatures.iter().map(|t| (t - b).max(0.0))))
                        .collect()
                });

                for use_heating in [false, true] {
                    for use_cooling in [false, true] {
                        let mut columns: Vec<&[f64]> = Vec::new();
                        if use_heating {
                            match &hdd {
                                Some(h) => columns.push(h),
                                None => continue,
                            }
                        }
                        if use_cooling {
                            match &cdd {
                                Some(c) => columns.push(c),
                                None => continue,
                            }
                        }

                        let Some(coefficients) = least_squares(&columns, &usage) else {
                            continue;
                        };
                        if coefficients[1..].iter().any(|slope| *slope < 0.0) {
                            continue;
                        }

                        let mut slopes = coefficients[1..].iter().copied();
                        let heating_slope = if use_heating { slopes.next() } else { None };
                        let cooling_slope = if use_cooling { slopes.next() } else { None };
                        let parameters = ModelParameters {
                            base_daily_consumption: coefficients[0],
                            heating_slope,
                            heating_balance_temperature: heating_slope.and(*hbt),
                            cooling_slope,
                            cooling_balance_temperature: cooling_slope.and(*cbt),
                        };

                        let sse = sum_squared_error(&parameters, &observations);
                        let improves = best
                            .as_ref()
                            .map_or(true, |(best_sse, _, _)| sse < *best_sse - 1e-12);
                        if improves {
                            best = Some((sse, coefficients.len(), parameters));
                        }
                    }
                }
            }
        }

        let (sse, n_parameters, parameters) = best?;
        let n = observations.len();
        let y_mean = mean(usage.iter().copied());
        let cvrmse = (n > n_parameters && y_mean != 0.0)
            .then(|| 100.0 * (sse / (n - n_parameters) as f64).sqrt() / y_mean);

        Some(ModelFit {
            parameters,
            cvrmse,
            n,
        })
    }
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 {
        f64::NAN
    } else {
        sum / count as f64
    }
}

fn sum_squared_error(parameters: &ModelParameters, observations: &[&Observation]) -> f64 {
    observations
        .iter()
        .map(|o| {
            let predicted = mean(o.temperatures.iter().map(|t| parameters.predict(*t)));
            (o.daily_usage - predicted).powi(2)
        })
        .sum()
}

/// OLS coefficients `[intercept, columns...]` via the normal equations
fn least_squares(columns: &[&[f64]], y: &[f64]) -> Option<Vec<f64>> {
    let k = columns.len() + 1;
    let row = |i: usize| -> Vec<f64> {
        std::iter::once(1.0)
            .chain(columns.iter().map(|c| c[i]))
            .collect()
    };

    let mut xtx = vec![vec![0.0; k]; k];
    let mut xty = vec![0.0; k];
    for (i, target) in y.iter().enumerate() {
        let x = row(i);
        for a in 0..k {
            xty[a] += x[a] * target;
            for b in 0..k {
                xtx[a][b] += x[a] * x[b];
            }
        }
    }

    solve(xtx, xty)
}

/// Gaussian elimination with partial pivoting; `None` when singular
fn solve(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Option<Vec<f64>> {
    let n = b.len();
    for col in 0..n {
        let pivot = (col..n).max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))?;
        if a[pivot][col].abs() < 1e-10 {
            return None;
        }
        a.swap(col, pivot);
        b.swap(col, pivot);

        for r in (col + 1)..n {
            let factor = a[r][col] / a[col][col];
            for c in col..n {
                a[r][c] -= factor * a[col][c];
            }
            b[r] -= factor * b[col];
        }
    }

    let mut x = vec![0.0; n];
    for r in (0..n).rev() {
        let tail: f64 = ((r + 1)..n).map(|c| a[r][c] * x[c]).sum();
        x[r] = (b[r] - tail) / a[r][r];
    }
    Some(x)
}
