//! Mendelian inheritance checks
//!
//! Error codes follow the usual trio classification:
//!
//! | Code | Father  | Mother  | Child  | Copy state |
//! |------|---------|---------|--------|------------|
//! | 1    | HomAlt  | HomAlt  | Het    | autosomal  |
//! | 2    | HomRef  | HomRef  | Het    | autosomal  |
//! | 3    | HomRef  | !HomRef | HomAlt | autosomal  |
//! | 4    | !HomRef | HomRef  | HomAlt | autosomal  |
//! | 5    | HomRef  | HomRef  | HomAlt | autosomal  |
//! | 6    | HomAlt  | !HomAlt | HomRef | autosomal  |
//! | 7    | !HomAlt | HomAlt  | HomRef | autosomal  |
//! | 8    | HomAlt  | HomAlt  | HomRef | autosomal  |
//! | 9    | any     | HomAlt  | HomRef | X, haploid child |
//! | 10   | any     | HomRef  | HomAlt | X, haploid child |
//! | 11   | HomAlt  | any     | HomRef | Y, haploid child |
//! | 12   | HomRef  | any     | HomAlt | Y, haploid child |
//!
//! Code 0 means the calls are compatible, or that they cannot be checked because a
//! required call is missing.

use super::genotype::{Genotype, Zygosity};

pub const COMPATIBLE: u8 = 0;

/// Inheritance model of a chromosome for a given child call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyState {
    Autosomal,
    HemizygousX,
    HemizygousY,
    Mitochondrial,
}

impl CopyState {
    /// X and Y are hemizygous only when the child call is haploid
    #[must_use]
    pub fn of(chromosome: &str, child: &Genotype) -> Self {
        let name = strip_chr_prefix(chromosome);
        match name {
            "M" | "MT" => Self::Mitochondrial,
            "X" if child.is_haploid() => Self::HemizygousX,
            "Y" if child.is_haploid() => Self::HemizygousY,
            _ => Self::Autosomal,
        }
    }
}

fn strip_chr_prefix(chromosome: &str) -> &str {
    match chromosome.get(..3) {
        Some(prefix) if prefix.eq_ignore_ascii_case("chr") => &chromosome[3..],
        _ => chromosome,
    }
}

fn called(genotype: Option<&Genotype>) -> Option<Zygosity> {
    genotype
        .map(Genotype::zygosity)
        .filter(|z| *z != Zygosity::NoCall)
}

/// Mendelian error code of a trio call, [`COMPATIBLE`] if none
///
/// A parent without a call (`None`) only prevents the checks that need it.
#[must_use]
pub fn mendelian_error(
    father: Option<&Genotype>,
    mother: Option<&Genotype>,
    child: &Genotype,
    chromosome: &str,
) -> u8 {
    use Zygosity::{Het, HomAlt, HomRef};

    let Some(kid) = called(Some(child)) else {
        return COMPATIBLE;
    };
    let dad = called(father);
    let mom = called(mother);

    match CopyState::of(chromosome, child) {
        CopyState::Mitochondrial => COMPATIBLE,
        CopyState::HemizygousX => match (mom, kid) {
            (Some(HomAlt), HomRef) => 9,
            (Some(HomRef), HomAlt) => 10,
            _ => COMPATIBLE,
        },
        CopyState::HemizygousY => match (dad, kid) {
            (Some(HomAlt), HomRef) => 11,
            (Some(HomRef), HomAlt) => 12,
            _ => COMPATIBLE,
        },
        CopyState::Autosomal => {
            let (Some(dad), Some(mom)) = (dad, mom) else {
                return COMPATIBLE;
            };
            match (dad, mom, kid) {
                (HomAlt, HomAlt, Het) => 1,
                (HomRef, HomRef, Het) => 2,
                (HomRef, HomRef, HomAlt) => 5,
                (HomRef, _, HomAlt) => 3,
                (_, HomRef, HomAlt) => 4,
                (HomAlt, HomAlt, HomRef) => 8,
                (HomAlt, _, HomRef) => 6,
                (_, HomAlt, HomRef) => 7,
                _ => COMPATIBLE,
            }
        }
    }
}
