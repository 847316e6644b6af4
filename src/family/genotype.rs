use std::fmt;
use std::str::FromStr;

use crate::GenotypeError;

/// A parsed genotype call such as `0/1`, `1|0`, `1` or `./.`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Genotype {
    /// Allele indexes, `None` for a missing allele
    alleles: Vec<Option<u32>>,
    phased: bool,
}

/// Coarse classification used by the inheritance rules
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Zygosity {
    HomRef,
    Het,
    HomAlt,
    /// At least one allele is missing
    NoCall,
}

impl Genotype {
    #[must_use]
    pub fn alleles(&self) -> &[Option<u32>] {
        &self.alleles
    }

    #[must_use]
    pub fn is_phased(&self) -> bool {
        self.phased
    }

    #[must_use]
    pub fn ploidy(&self) -> usize {
        self.alleles.len()
    }

    #[must_use]
    pub fn is_haploid(&self) -> bool {
        self.alleles.len() == 1
    }

    /// Every allele is missing
    #[must_use]
    pub fn is_missing(&self) -> bool {
        self.alleles.iter().all(Option::is_none)
    }

    /// At least one allele is an alternate
    #[must_use]
    pub fn has_alt(&self) -> bool {
        self.alleles.iter().any(|a| matches!(a, Some(n) if *n > 0))
    }

    #[must_use]
    pub fn zygosity(&self) -> Zygosity {
        let mut called = Vec::with_capacity(self.alleles.len());
        for allele in &self.alleles {
            match allele {
                Some(n) => called.push(*n),
                None => return Zygosity::NoCall,
            }
        }
        match called.as_slice() {
            [] => Zygosity::NoCall,
            [first, rest @ ..] if rest.iter().all(|a| a == first) => {
                if *first == 0 {
                    Zygosity::HomRef
                } else {
                    Zygosity::HomAlt
                }
            }
            _ => Zygosity::Het,
        }
    }
}

impl FromStr for Genotype {
    type Err = GenotypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || GenotypeError::Invalid(s.to_string());
        if s.is_empty() {
            return Err(invalid());
        }
        let phased = s.contains('|');
        let alleles = s
            .split(['/', '|'])
            .map(|token| match token {
                "." => Ok(None),
                _ if !token.is_empty() && token.bytes().all(|b| b.is_ascii_digit()) => {
                    token.parse().map(Some).map_err(|_| invalid())
                }
                _ => Err(invalid()),
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { alleles, phased })
    }
}

impl fmt::Display for Genotype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sep = if self.phased { "|" } else { "/" };
        for (i, allele) in self.alleles.iter().enumerate() {
            if i > 0 {
                f.write_str(sep)?;
            }
            match allele {
                Some(n) => write!(f, "{n}")?,
                None => f.write_str(".")?,
            }
        }
        Ok(())
    }
}

/// Whether a genotype string is stored in the sample index
///
/// Only calls carrying an alternate allele are indexed.
pub fn is_indexed_genotype(gt: &str) -> Result<bool, GenotypeError> {
    Ok(gt.parse::<Genotype>()?.has_alt())
}

/// 4-bit codes of parent genotypes
///
/// Father and mother share one byte per child call: father in the low nibble,
/// mother in the high nibble.
pub mod parent_code {
    use super::{Genotype, Zygosity};

    pub const HOM_REF_UNPHASED: u8 = 0;
    pub const HET_REF_UNPHASED: u8 = 1;
    pub const HOM_ALT_UNPHASED: u8 = 2;
    pub const HOM_REF_PHASED: u8 = 3;
    pub const HET_REF_PHASED: u8 = 4;
    pub const HET_ALT_PHASED: u8 = 5;
    pub const HOM_ALT_PHASED: u8 = 6;
    pub const HEMI_REF: u8 = 7;
    pub const HEMI_ALT: u8 = 8;
    /// Homozygous for an allele other than the first alternate
    pub const MULTI_HOM: u8 = 9;
    /// Any other call with a secondary alternate
    pub const MULTI: u8 = 10;
    pub const MISSING_HOM: u8 = 11;
    /// Partially missing or haploid missing call
    pub const MISSING: u8 = 12;
    /// No information about the parent
    pub const UNKNOWN: u8 = 13;
    /// The parent has conflicting calls
    pub const DISCREPANCY: u8 = 14;
    /// The call could not be parsed
    pub const INVALID: u8 = 15;

    pub const BITS: usize = 4;

    /// Code of a parent call, [`UNKNOWN`] if there is none
    #[must_use]
    pub fn encode(gt: Option<&str>) -> u8 {
        let Some(gt) = gt else {
            return UNKNOWN;
        };
        match gt.parse::<Genotype>() {
            Ok(genotype) => encode_genotype(&genotype),
            Err(_) => INVALID,
        }
    }

    #[must_use]
    pub fn encode_genotype(genotype: &Genotype) -> u8 {
        let alleles = genotype.alleles();
        if genotype.is_missing() {
            return if alleles.len() == 2 { MISSING_HOM } else { MISSING };
        }
        if genotype.zygosity() == Zygosity::NoCall {
            return MISSING;
        }
        if alleles.iter().any(|a| matches!(a, Some(n) if *n > 1)) {
            return if genotype.zygosity() == Zygosity::HomAlt {
                MULTI_HOM
            } else {
                MULTI
            };
        }
        match (alleles, genotype.is_phased()) {
            ([Some(0)], _) => HEMI_REF,
            ([Some(1)], _) => HEMI_ALT,
            ([Some(0), Some(0)], false) => HOM_REF_UNPHASED,
            ([Some(0), Some(0)], true) => HOM_REF_PHASED,
            ([Some(0), Some(1)] | [Some(1), Some(0)], false) => HET_REF_UNPHASED,
            ([Some(0), Some(1)], true) => HET_REF_PHASED,
            ([Some(1), Some(0)], true) => HET_ALT_PHASED,
            ([Some(1), Some(1)], false) => HOM_ALT_UNPHASED,
            ([Some(1), Some(1)], true) => HOM_ALT_PHASED,
            _ => MULTI,
        }
    }

    /// A representative genotype of a code, if it stands for a single call
    #[must_use]
    pub fn decode(code: u8) -> Option<&'static str> {
        match code {
            HOM_REF_UNPHASED => Some("0/0"),
            HET_REF_UNPHASED => Some("0/1"),
            HOM_ALT_UNPHASED => Some("1/1"),
            HOM_REF_PHASED => Some("0|0"),
            HET_REF_PHASED => Some("0|1"),
            HET_ALT_PHASED => Some("1|0"),
            HOM_ALT_PHASED => Some("1|1"),
            HEMI_REF => Some("0"),
            HEMI_ALT => Some("1"),
            MISSING_HOM => Some("./."),
            MISSING => Some("."),
            _ => None,
        }
    }
}
