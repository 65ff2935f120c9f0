//! Chart data derived from an amortization schedule.
//!
//! Drawing is behind [`ChartRenderer`]; [`TextChart`] is the terminal renderer the
//! binary uses. Other renderers only need the data types here.
use crate::loan::AmortizationResult;

/// Totals for the principal versus interest split.
#[derive(Clone, Copy, PartialEq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct PaymentBreakdown {
    pub total_principal: f64,
    pub total_interest: f64,
}

impl PaymentBreakdown {
    pub fn from_schedule(result: &AmortizationResult) -> Self {
        Self {
            total_principal: result.total_principal(),
            total_interest: result.total_interest(),
        }
    }

    pub fn total(&self) -> f64 {
        self.total_principal + self.total_interest
    }

    /// Principal as a percentage of everything paid, 0 when nothing was paid.
    pub fn principal_share(&self) -> f64 {
        share(self.total_principal, self.total())
    }

    pub fn interest_share(&self) -> f64 {
        share(self.total_interest, self.total())
    }

    pub fn labels(&self) -> [String; 2] {
        [
            format!("Principal {:.1}%", self.principal_share()),
            format!("Interest {:.1}%", self.interest_share()),
        ]
    }
}

fn share(part: f64, total: f64) -> f64 {
    if total == 0. {
        0.
    } else {
        part / total * 100.
    }
}

#[derive(Clone, Copy, PartialEq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct BalancePoint {
    pub month: u32,
    pub balance: f64,
}

pub fn balance_series(result: &AmortizationResult) -> Vec<BalancePoint> {
    result
        .periods()
        .iter()
        .map(|p| BalancePoint {
            month: p.index,
            balance: p.remaining_balance,
        })
        .collect()
}

/// Something that can draw the two mortgage charts.
pub trait ChartRenderer {
    type Output;

    fn breakdown(&self, breakdown: &PaymentBreakdown) -> Self::Output;

    fn balance(&self, series: &[BalancePoint]) -> Self::Output;
}

/// Plain-text charts for a terminal.
#[derive(Clone, Copy, Debug)]
pub struct TextChart {
    pub width: usize,
    pub height: usize,
}

impl Default for TextChart {
    fn default() -> Self {
        Self {
            width: 60,
            height: 12,
        }
    }
}

pub const BREAKDOWN_TITLE: &str = "Total Payment Breakdown";
pub const BALANCE_TITLE: &str = "Mortgage Amortization Schedule";

impl ChartRenderer for TextChart {
    type Output = String;

    fn breakdown(&self, breakdown: &PaymentBreakdown) -> String {
        let width = self.width.max(1);
        let principal_cells = if breakdown.total() == 0. {
            0
        } else {
            (breakdown.principal_share() / 100. * width as f64).round() as usize
        };
        let interest_cells = if breakdown.total() == 0. {
            0
        } else {
            width - principal_cells.min(width)
        };
        let [principal_label, interest_label] = breakdown.labels();

        let lines = [
            BREAKDOWN_TITLE.to_string(),
            format!(
                "[{}{}]",
                "#".repeat(principal_cells),
                ".".repeat(interest_cells)
            ),
            format!(
                "# {} (${:.2})   . {} (${:.2})",
                principal_label,
                breakdown.total_principal,
                interest_label,
                breakdown.total_interest
            ),
        ];
        text_block(&lines)
    }

    fn balance(&self, series: &[BalancePoint]) -> String {
        let (Some(first), Some(last)) = (series.first(), series.last()) else {
            return text_block(&[BALANCE_TITLE.to_string(), "(no payments)".to_string()]);
        };

        let width = self.width.max(1).min(series.len());
        let height = self.height.max(1);
        let top = series
            .iter()
            .map(|p| p.balance)
            .fold(0_f64, f64::max);

        // one column per bucket of months, showing the balance at the bucket's end
        let columns: Vec<f64> = (0..width)
            .map(|col| {
                let idx = ((col + 1) * series.len()).div_ceil(width) - 1;
                series[idx].balance.max(0.)
            })
            .collect();

        let mut lines = vec![BALANCE_TITLE.to_string()];
        for row in (1..=height).rev() {
            let threshold = top * row as f64 / height as f64;
            let label = if row == height {
                format!("{top:>12.0} |")
            } else {
                format!("{:>12} |", "")
            };
            let plot: String = columns
                .iter()
                .map(|&b| {
                    if top > 0. && b >= threshold - top / (2 * height) as f64 {
                        '*'
                    } else {
                        ' '
                    }
                })
                .collect();
            lines.push(format!("{label}{}", plot.trim_end()));
        }
        lines.push(format!("{:>12} +{}", 0, "-".repeat(width)));
        lines.push(format!(
            "{:>14}month {}{:>w$}",
            "",
            first.month,
            last.month,
            w = width.saturating_sub(7 + first.month.to_string().len()).max(1)
        ));
        text_block(&lines)
    }
}

/// Joins chart lines, each terminated by a newline.
fn text_block(lines: &[String]) -> String {
    lines.iter().map(|line| format!("{line}\n")).collect()
}
