//! Ids of the variables the compiler reads or writes by name
//!
//! Every lookup is done once per resolved set; a variable that was not
//! resolved has no id and every read or write of it is skipped.

use crate::resolver::{VarId, VariableSet};

macro_rules! known_variables {
    ($($variant:ident => $name:literal,)*) => {
        /// A variable with compiler-defined semantics
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub(crate) enum Known {
            $($variant,)*
        }

        impl Known {
            pub(crate) const ALL: &'static [Self] = &[$(Self::$variant,)*];

            pub(crate) const fn name(self) -> &'static str {
                match self {
                    $(Self::$variant => $name,)*
                }
            }
        }
    };
}

known_variables! {
    // Demographics
    IsMale => "IsMale",
    WtKg => "WtKg",
    IsCaucasian => "IsCaucasian",
    AgeInYrs => "AgeInYrs",

    // Lab inputs to calculated values
    Cr => "Cr",
    Na => "Na",
    Tbili => "Tbili",
    Inr => "INR",
    Bun => "BUN",
    Iron => "Iron",
    TransferrinSat => "TransferrinSat",
    Transferrin => "Transferrin",
    AbsNeutrophils => "AbsNeutrophils",
    AbsLymphs => "AbsLymphs",
    Cl => "Cl",
    Co2 => "CO2",
    TProt => "TProt",
    Alb => "Alb",
    UNa => "UNa",
    UK => "UK",
    UCl => "UCl",
    UpepAlb => "UPEPAlb",
    UAlb => "UAlb",
    UCr => "UCr",
    UpepTProt => "UPEPTProt",
    UProt => "UProt",
    Uun => "UUN",
    Ca => "Ca",
    FlcKappa => "FLCKappa",
    FlcLambda => "FLCLambda",

    // Status driven by events and outcomes
    DiedThisAdmission => "DiedThisAdmission",
    InHospital => "InHospital",
    HospitalAdmitDate => "HospitalAdmitDate",
    HospitalAdmissionFlag => "Flag_HospitalAdmission",
    HospitalDischargeFlag => "Flag_HospitalDischarge",
    InIcu => "InICU",
    MajorSurgeries => "MajorSurgeries",
    GiProcedures => "GIProcedures",
    Procedure => "Procedure",
    Surgery => "Surgery",
    MostRecentDialysisDate => "MostRecentDialysisDate",
    MostRecentMajorSurgeryDate => "MostRecentMajorSurgeryDate",
    TransRbc => "TransRBC",
    TransPlts => "TransPlts",
    TransFfp => "TransFFP",
    TransCryo => "TransCryo",

    // Calculated on the forward pass
    Gfr => "GFR",
    Meld => "MELD",
    BaselineCr => "BaselineCr",
    BunCrRatio => "BUNCrRatio",
    Tibc => "TIBC",
    NeutLymphRatio => "NeutLymphRatio",
    AnionGap => "AnionGap",
    ProtGap => "ProtGap",
    UrineAnionGap => "UrineAnionGap",
    Uacr => "UACR",
    Upcr => "UPCR",
    FeNa => "FENa",
    FeUrea => "FEUrea",
    AdjustCa => "AdjustCa",
    KappaLambdaRatio => "KappaLambdaRatio",
    HospitalDay => "HospitalDay",
    Cyp2c9Inducer => "CYP2C9Inducer",
    Cyp2c9Inhibiter => "CYP2C9Inhibiter",
    Cyp3a4Inducer => "CYP3A4Inducer",
    Cyp3a4Inhibitor => "CYP3A4Inhibitor",

    // Written on the reverse pass
    BaselineGfr => "BaselineGFR",
    InAki => "InAKI",
    NextAkiDate => "NextAKIDate",
    NextCrAtBaselineDate => "NextCrAtBaselineDate",
    DaysUntilAki => "Future_Days_Until_AKI",
    CategoryAki => "Future_Category_AKI",
    DaysUntilAkiResolution => "Future_Days_Until_AKIResolution",
    CategoryAkiResolution => "Future_Category_AKIResolution",
    EventualDeathDate => "EventualDeathDate",
    LengthOfStay => "LengthOfStay",
    NextDischargeDate => "NextFutureDischargeDate",
    NextRapidResponseDate => "NextFutureRapidResponseDate",
    NextIcuTransferDate => "NextFutureTransferToICUDate",
    NextWardTransferDate => "NextFutureTransferToWardDate",
}

/// `Known` ids for one resolved set
#[derive(Debug, Clone)]
pub(crate) struct KnownIds {
    ids: Vec<Option<VarId>>,
}

impl KnownIds {
    pub(crate) fn new(set: &VariableSet) -> Self {
        Self {
            ids: Known::ALL.iter().map(|k| set.id(k.name())).collect(),
        }
    }

    pub(crate) fn get(&self, known: Known) -> Option<VarId> {
        self.ids[known as usize]
    }

    pub(crate) fn has(&self, known: Known) -> bool {
        self.get(known).is_some()
    }
}

/// The three labels derived from one tracked future event
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct OutcomeIds {
    pub boolean: Option<VarId>,
    pub days_until: Option<VarId>,
    pub category: Option<VarId>,
}

impl OutcomeIds {
    pub(crate) fn new(set: &VariableSet, label: &str) -> Self {
        Self {
            boolean: set.id(&format!("Future_Boolean_{label}")),
            days_until: set.id(&format!("Future_Days_Until_{label}")),
            category: set.id(&format!("Future_Category_{label}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use itertools::Itertools;

    /// Test known names are unique so ids cannot alias
    #[test]
    fn test_names_unique() {
        assert_eq!(
            Known::ALL.iter().map(|k| k.name()).unique().count(),
            Known::ALL.len()
        );
        assert_eq!(Known::ALL[Known::Gfr as usize], Known::Gfr);
    }
}
