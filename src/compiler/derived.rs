//! Calculated values computed inline on the forward pass
//!
//! These need only the current snapshot (plus the trailing baseline series),
//! so they are refreshed after every node. An absent input leaves the
//! calculated value untouched.

use crate::compiler::known::{Known, KnownIds};
use crate::functions::MinimumSeries;
use crate::resolver::{VarId, VariableSet};
use crate::timeline::Snapshot;

/// Estimated GFR, CKD-EPI 2021 race-free equation
///
/// # Arguments
///
/// * `creatinine` - Serum creatinine in mg/dL
/// * `age` - Age in years
/// * `is_male` - Sex used for the kappa/alpha constants
#[must_use]
pub fn ckd_epi_2021(creatinine: f64, age: f64, is_male: bool) -> f64 {
    let (kappa, alpha) = if is_male { (0.9, -0.302) } else { (0.7, -0.241) };
    let ratio = creatinine / kappa;
    let mut egfr = 142.0;
    if ratio < 1.0 {
        egfr *= ratio.powf(alpha);
    }
    if ratio > 1.0 {
        egfr *= ratio.powf(-1.209);
    }
    egfr *= 0.9938_f64.powf(age);
    if !is_male {
        egfr *= 1.018;
    }
    egfr
}

/// MELD-Na score with the standard input bounds
#[must_use]
pub fn meld_na(creatinine: f64, sodium: f64, bilirubin: f64, inr: f64) -> f64 {
    let inr = inr.max(1.0);
    let bilirubin = bilirubin.max(1.0);
    let creatinine = creatinine.clamp(1.0, 4.0);
    let sodium = sodium.clamp(125.0, 137.0);

    let mut score = 10.0 * (0.957 * creatinine.ln() + 0.378 * bilirubin.ln() + 1.12 * inr.ln() + 0.643);
    if score > 11.0 {
        score = score + 1.32 * (137.0 - sodium) - 0.033 * score * (137.0 - sodium);
    }
    score
}

/// Which formula fills a calculated variable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Formula {
    Gfr,
    Meld,
    /// Number of dependency drugs given today
    DrugCount,
    BaselineCr,
    BunCrRatio,
    Tibc,
    NeutLymphRatio,
    AnionGap,
    ProtGap,
    UrineAnionGap,
    Uacr,
    Upcr,
    FeNa,
    FeUrea,
    AdjustCa,
    KappaLambdaRatio,
    HospitalDay,
}

impl Formula {
    fn for_variable(name: &str) -> Option<Self> {
        let formula = match name {
            "GFR" => Self::Gfr,
            "MELD" => Self::Meld,
            "CYP2C9Inducer" | "CYP2C9Inhibiter" | "CYP3A4Inducer" | "CYP3A4Inhibitor" => {
                Self::DrugCount
            }
            "BaselineCr" => Self::BaselineCr,
            "BUNCrRatio" => Self::BunCrRatio,
            "TIBC" => Self::Tibc,
            "NeutLymphRatio" => Self::NeutLymphRatio,
            "AnionGap" => Self::AnionGap,
            "ProtGap" => Self::ProtGap,
            "UrineAnionGap" => Self::UrineAnionGap,
            "UACR" => Self::Uacr,
            "UPCR" => Self::Upcr,
            "FENa" => Self::FeNa,
            "FEUrea" => Self::FeUrea,
            "AdjustCa" => Self::AdjustCa,
            "KappaLambdaRatio" => Self::KappaLambdaRatio,
            "HospitalDay" => Self::HospitalDay,
            _ => return None,
        };
        Some(formula)
    }
}

/// One calculated variable and how to fill it
#[derive(Debug, Clone)]
pub(crate) struct DerivedStep {
    pub id: VarId,
    pub formula: Formula,
    /// Resolved dependencies, used by `DrugCount`
    pub drugs: Vec<VarId>,
}

/// The forward-pass calculated variables of a resolved set, in id order
pub(crate) fn plan(set: &VariableSet) -> Vec<DerivedStep> {
    set.calculated()
        .filter_map(|(id, descriptor)| {
            let formula = Formula::for_variable(&descriptor.name)?;
            let drugs = if formula == Formula::DrugCount {
                descriptor.dependencies.iter().filter_map(|d| set.id(d)).collect()
            } else {
                Vec::new()
            };
            Some(DerivedStep { id, formula, drugs })
        })
        .collect()
}

fn ratio(numerator: Option<f64>, denominator: Option<f64>) -> Option<f64> {
    let (n, d) = (numerator?, denominator?);
    (d != 0.0).then(|| n / d)
}

/// Refresh one calculated variable on `snapshot`
pub(crate) fn apply(
    step: &DerivedStep,
    snapshot: &mut Snapshot,
    known: &KnownIds,
    day: i32,
    baseline_cr: &mut MinimumSeries,
) {
    let get = |k: Known| snapshot.number_of(known.get(k));

    let value = match step.formula {
        Formula::Gfr => match (get(Known::Cr), get(Known::AgeInYrs)) {
            (Some(cr), Some(age)) => {
                let is_male = get(Known::IsMale).is_some_and(|m| m > 0.0);
                Some(ckd_epi_2021(cr, age, is_male).round_ties_even()).filter(|g| *g > 0.0)
            }
            _ => None,
        },
        Formula::Meld => match (get(Known::Cr), get(Known::Na), get(Known::Tbili), get(Known::Inr)) {
            (Some(cr), Some(na), Some(bili), Some(inr)) => {
                Some(meld_na(cr, na, bili, inr).round_ties_even())
            }
            _ => None,
        },
        Formula::DrugCount => {
            let given = step
                .drugs
                .iter()
                .filter(|&&drug| snapshot.number(drug).is_some_and(|dose| dose > 0.0))
                .count();
            #[allow(clippy::cast_precision_loss)]
            Some(given as f64)
        }
        Formula::BaselineCr => {
            if let Some(cr) = get(Known::Cr) {
                baseline_cr.push(cr, day);
            }
            baseline_cr.minimum()
        }
        Formula::BunCrRatio => ratio(get(Known::Bun), get(Known::Cr)).map(f64::round_ties_even),
        Formula::Tibc => ratio(get(Known::Iron), get(Known::TransferrinSat))
            .or_else(|| get(Known::Transferrin).map(|t| (t + 43.0) / 0.8))
            .map(|v| v.round_ties_even() * 100.0),
        Formula::NeutLymphRatio => {
            ratio(get(Known::AbsNeutrophils), get(Known::AbsLymphs)).map(f64::round_ties_even)
        }
        Formula::AnionGap => match (get(Known::Na), get(Known::Cl), get(Known::Co2)) {
            (Some(na), Some(cl), Some(co2)) => Some(na - (cl + co2)),
            _ => None,
        },
        Formula::ProtGap => match (get(Known::TProt), get(Known::Alb)) {
            (Some(tprot), Some(alb)) => Some(tprot - alb),
            _ => None,
        },
        Formula::UrineAnionGap => match (get(Known::UNa), get(Known::UK), get(Known::UCl)) {
            (Some(na), Some(k), Some(cl)) => Some(na + k - cl),
            _ => None,
        },
        Formula::Uacr => get(Known::UpepAlb).or_else(|| ratio(get(Known::UAlb), get(Known::UCr))),
        Formula::Upcr => get(Known::UpepTProt)
            .or_else(|| snapshot.number(step.id))
            .or_else(|| ratio(get(Known::UProt), get(Known::UCr))),
        Formula::FeNa => match (get(Known::Cr), get(Known::Na), get(Known::UCr), get(Known::UNa)) {
            (Some(cr), Some(na), Some(ucr), Some(una)) => ratio(Some(100.0 * cr * una), Some(na * ucr)),
            _ => None,
        },
        Formula::FeUrea => match (get(Known::Cr), get(Known::Bun), get(Known::UCr), get(Known::Uun)) {
            (Some(cr), Some(bun), Some(ucr), Some(uun)) => {
                ratio(Some(100.0 * cr * uun), Some(bun * ucr))
            }
            _ => None,
        },
        Formula::AdjustCa => match (get(Known::Ca), get(Known::Alb)) {
            (Some(ca), Some(alb)) => Some(ca + 0.8 * (4.0 - alb)),
            (ca, None) => ca,
            (None, Some(_)) => None,
        },
        Formula::KappaLambdaRatio => ratio(get(Known::FlcKappa), get(Known::FlcLambda)),
        Formula::HospitalDay => get(Known::HospitalAdmitDate).map(|admit| f64::from(day) - admit + 1.0),
    };

    if let Some(value) = value {
        snapshot.set_number(step.id, value);
    }
}
