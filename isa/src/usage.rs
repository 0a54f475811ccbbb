use num_enum::IntoPrimitive;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use strum::IntoStaticStr;

use crate::config::{Config, LdsPolicy};
use crate::csv;
use crate::error::{read_file, Error, Result};

// ----------------------------------------------------------------------------
// Record

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ResourceUsageRecord {
    pub device: String,
    pub scratch_memory_bytes: u64,
    pub threads_per_workgroup: u64,
    pub wavefront_size: u64,
    pub available_lds_bytes: u64,
    pub used_lds_bytes: u64,
    pub available_sgprs: u64,
    pub used_sgprs: u64,
    pub sgpr_spills: u64,
    pub available_vgprs: u64,
    pub used_vgprs: u64,
    pub vgpr_spills: u64,
    pub workgroup_dims: (u64, u64, u64),
    pub isa_size_bytes: u64,
}

/// Column order of a resource usage CSV row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, IntoStaticStr)]
#[repr(u8)]
enum UsageColumn {
    #[strum(serialize = "DEVICE")]
    Device,
    #[strum(serialize = "SCRATCH_MEM")]
    ScratchMemory,
    #[strum(serialize = "THREADS_PER_WORKGROUP")]
    ThreadsPerWorkgroup,
    #[strum(serialize = "WAVEFRONT_SIZE")]
    WavefrontSize,
    #[strum(serialize = "AVAILABLE_LDS_BYTES")]
    AvailableLdsBytes,
    #[strum(serialize = "USED_LDS_BYTES")]
    UsedLdsBytes,
    #[strum(serialize = "AVAILABLE_SGPRs")]
    AvailableSgprs,
    #[strum(serialize = "USED_SGPRs")]
    UsedSgprs,
    #[strum(serialize = "SGPR_SPILLS")]
    SgprSpills,
    #[strum(serialize = "AVAILABLE_VGPRs")]
    AvailableVgprs,
    #[strum(serialize = "USED_VGPRs")]
    UsedVgprs,
    #[strum(serialize = "VGPR_SPILLS")]
    VgprSpills,
    #[strum(serialize = "CL_WORKGROUP_X_DIMENSION")]
    WorkgroupX,
    #[strum(serialize = "CL_WORKGROUP_Y_DIMENSION")]
    WorkgroupY,
    #[strum(serialize = "CL_WORKGROUP_Z_DIMENSION")]
    WorkgroupZ,
    #[strum(serialize = "ISA_SIZE")]
    IsaSize,
}

impl UsageColumn {
    const COUNT: usize = 16;

    fn text(self, tokens: &[String]) -> &str {
        let index: u8 = self.into();
        tokens[index as usize].trim()
    }

    fn number(self, tokens: &[String]) -> Result<u64> {
        let text = self.text(tokens);
        text.parse().map_err(|_| Error::InvalidNumber {
            column: self.into(),
            text: text.to_string(),
        })
    }
}

impl ResourceUsageRecord {
    pub fn parse_row(tokens: &[String]) -> Result<Self> {
        use UsageColumn as C;

        if tokens.len() != C::COUNT {
            return Err(Error::ColumnCount {
                expected: C::COUNT.to_string(),
                found: tokens.len(),
            });
        }

        Ok(ResourceUsageRecord {
            device: C::Device.text(tokens).to_string(),
            scratch_memory_bytes: C::ScratchMemory.number(tokens)?,
            threads_per_workgroup: C::ThreadsPerWorkgroup.number(tokens)?,
            wavefront_size: C::WavefrontSize.number(tokens)?,
            available_lds_bytes: C::AvailableLdsBytes.number(tokens)?,
            used_lds_bytes: C::UsedLdsBytes.number(tokens)?,
            available_sgprs: C::AvailableSgprs.number(tokens)?,
            used_sgprs: C::UsedSgprs.number(tokens)?,
            sgpr_spills: C::SgprSpills.number(tokens)?,
            available_vgprs: C::AvailableVgprs.number(tokens)?,
            used_vgprs: C::UsedVgprs.number(tokens)?,
            vgpr_spills: C::VgprSpills.number(tokens)?,
            workgroup_dims: (
                C::WorkgroupX.number(tokens)?,
                C::WorkgroupY.number(tokens)?,
                C::WorkgroupZ.number(tokens)?,
            ),
            isa_size_bytes: C::IsaSize.number(tokens)?,
        })
    }
}

/// Parse resource usage CSV text. Row 1 is the header; each later row is one device.
pub fn parse_resource_usage(path: impl AsRef<Path>, text: &str) -> Result<Vec<ResourceUsageRecord>> {
    let path = path.as_ref();
    let mut records = Vec::new();
    for (idx, raw) in text.lines().enumerate().skip(1) {
        let raw = raw.trim_end_matches('\r');
        if raw.trim().is_empty() {
            continue;
        }
        let record = csv::tokenize(raw)
            .and_then(|tokens| ResourceUsageRecord::parse_row(&tokens))
            .map_err(|e| e.at_line(path, idx + 1))?;
        records.push(record);
    }
    tracing::debug!(path = %path.display(), records = records.len(), "loaded resource usage");
    Ok(records)
}

pub fn load_resource_usage(path: impl AsRef<Path>) -> Result<Vec<ResourceUsageRecord>> {
    let path = path.as_ref();
    let text = read_file(path)?;
    parse_resource_usage(path, &text)
}

// ----------------------------------------------------------------------------
// Hazards

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct HazardFlags {
    pub vgpr: bool,
    pub sgpr: bool,
    pub lds: bool,
    pub scratch: bool,
    pub icache: bool,
}

impl HazardFlags {
    pub fn overall(&self) -> bool {
        self.vgpr || self.sgpr || self.lds || self.scratch || self.icache
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceUsageAnalyzer {
    lds_policy: LdsPolicy,
    icache_size_bytes: u64,
}

impl Default for ResourceUsageAnalyzer {
    fn default() -> Self {
        Self::new(&Config::default())
    }
}

impl ResourceUsageAnalyzer {
    pub fn new(config: &Config) -> Self {
        ResourceUsageAnalyzer {
            lds_policy: config.lds_policy,
            icache_size_bytes: config.icache_size_bytes,
        }
    }

    pub fn compute_hazards(&self, r: &ResourceUsageRecord) -> HazardFlags {
        HazardFlags {
            vgpr: r.vgpr_spills > 0 || r.used_vgprs >= r.available_vgprs,
            sgpr: r.sgpr_spills > 0 || r.used_sgprs >= r.available_sgprs,
            lds: r.used_lds_bytes >= self.lds_policy.limit(r.available_lds_bytes),
            scratch: r.scratch_memory_bytes > 0,
            icache: r.isa_size_bytes > 0 && r.isa_size_bytes > self.icache_size_bytes,
        }
    }

    pub fn report(&self, record: &ResourceUsageRecord) -> ResourceUsageReport {
        let hazards = self.compute_hazards(record);
        ResourceUsageReport {
            device: record.device.clone(),
            vgprs: Metric {
                used: record.used_vgprs,
                available: Some(record.available_vgprs),
                spills: Some(record.vgpr_spills).filter(|&n| n > 0),
                hazard: hazards.vgpr,
            },
            sgprs: Metric {
                used: record.used_sgprs,
                available: Some(record.available_sgprs),
                spills: Some(record.sgpr_spills).filter(|&n| n > 0),
                hazard: hazards.sgpr,
            },
            lds: Metric {
                used: record.used_lds_bytes,
                available: Some(self.lds_policy.limit(record.available_lds_bytes)),
                spills: None,
                hazard: hazards.lds,
            },
            scratch: Metric {
                used: record.scratch_memory_bytes,
                available: None,
                spills: None,
                hazard: hazards.scratch,
            },
            icache: (record.isa_size_bytes > 0).then_some(Metric {
                used: record.isa_size_bytes,
                available: Some(self.icache_size_bytes),
                spills: None,
                hazard: hazards.icache,
            }),
            hazards,
        }
    }
}

// ----------------------------------------------------------------------------
// Report

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metric {
    pub used: u64,
    pub available: Option<u64>,
    pub spills: Option<u64>,
    pub hazard: bool,
}

/// Per-metric numbers and hazard flags, ready for a presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceUsageReport {
    pub device: String,
    pub vgprs: Metric,
    pub sgprs: Metric,
    pub lds: Metric,
    pub scratch: Metric,
    /// Absent when the ISA size is unknown.
    pub icache: Option<Metric>,
    pub hazards: HazardFlags,
}

impl ResourceUsageReport {
    /// Sections in display order, paired with their label.
    pub fn sections(&self) -> Vec<(&'static str, String, bool)> {
        let mut sections = vec![
            ("VGPRs", registers(&self.vgprs), self.vgprs.hazard),
            ("SGPRs", registers(&self.sgprs), self.sgprs.hazard),
            ("LDS", lds(&self.lds), self.lds.hazard),
            ("Scratch memory", size_acronym(self.scratch.used), self.scratch.hazard),
        ];
        if let Some(icache) = self.icache.filter(|m| m.hazard) {
            let text = format!(
                "{} B / {}",
                icache.used,
                size_acronym(icache.available.unwrap_or_default())
            );
            sections.push(("Instruction cache", text, true));
        }
        sections
    }
}

impl fmt::Display for ResourceUsageReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = self
            .sections()
            .into_iter()
            .map(|(label, value, _)| format!("{}: {}", label, value))
            .collect::<Vec<_>>()
            .join(" | ");
        write!(f, "{}", text)
    }
}

fn registers(m: &Metric) -> String {
    let mut text = format!("{} / {}", m.used, m.available.unwrap_or_default());
    if let Some(spills) = m.spills {
        text.push_str(&format!(" -> {} spills", spills));
    }
    text
}

fn lds(m: &Metric) -> String {
    let used = if m.used > 0 {
        format!("{} B", m.used)
    } else {
        "0".to_string()
    };
    format!("{} / {}", used, size_acronym(m.available.unwrap_or_default()))
}

/// 65536 -> "64 KB", 1536 -> "1.5 KB".
pub fn size_acronym(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if value.fract() == 0.0 {
        format!("{} {}", value as u64, UNITS[unit])
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> ResourceUsageRecord {
        ResourceUsageRecord {
            device: "gfx1030".to_string(),
            available_vgprs: 64,
            available_sgprs: 104,
            available_lds_bytes: 65536,
            ..Default::default()
        }
    }

    macro_rules! test_hazard {
        ($($name:ident: |$r:ident| $setup:block => $field:ident == $expect:expr,)*) => {
            $(
                #[test]
                fn $name() {
                    let mut $r = record();
                    $setup
                    let flags = ResourceUsageAnalyzer::default().compute_hazards(&$r);
                    assert_eq!(flags.$field, $expect);
                }
            )*
        }
    }

    test_hazard! {
        vgpr_below: |r| { r.used_vgprs = 63; } => vgpr == false,
        vgpr_equal: |r| { r.used_vgprs = 64; } => vgpr == true,
        vgpr_spill: |r| { r.vgpr_spills = 1; } => vgpr == true,
        sgpr_equal: |r| { r.used_sgprs = 104; } => sgpr == true,
        sgpr_spill: |r| { r.sgpr_spills = 3; } => sgpr == true,
        lds_below: |r| { r.used_lds_bytes = 65535; } => lds == false,
        lds_equal: |r| { r.used_lds_bytes = 65536; } => lds == true,
        scratch_none: |r| { r.scratch_memory_bytes = 0; } => scratch == false,
        scratch_any: |r| { r.scratch_memory_bytes = 4; } => scratch == true,
        icache_unknown: |r| { r.isa_size_bytes = 0; } => icache == false,
        icache_fits: |r| { r.isa_size_bytes = 32768; } => icache == false,
        icache_over: |r| { r.isa_size_bytes = 32769; } => icache == true,
    }

    #[test]
    fn sgpr_spill_scenario() {
        let r = ResourceUsageRecord {
            vgpr_spills: 0,
            used_vgprs: 40,
            available_vgprs: 64,
            sgpr_spills: 2,
            used_sgprs: 50,
            available_sgprs: 104,
            used_lds_bytes: 0,
            available_lds_bytes: 65536,
            scratch_memory_bytes: 0,
            isa_size_bytes: 1000,
            ..Default::default()
        };
        let flags = ResourceUsageAnalyzer::default().compute_hazards(&r);
        assert_eq!(
            flags,
            HazardFlags {
                vgpr: false,
                sgpr: true,
                lds: false,
                scratch: false,
                icache: false,
            }
        );
        assert!(flags.overall());
    }

    #[test]
    fn fixed_lds_ceiling() {
        let config = Config {
            lds_policy: LdsPolicy::FixedCeiling { bytes: 65536 },
            ..Default::default()
        };
        let mut r = record();
        r.available_lds_bytes = 32768;
        r.used_lds_bytes = 40000;
        assert!(!ResourceUsageAnalyzer::new(&config).compute_hazards(&r).lds);
        assert!(ResourceUsageAnalyzer::default().compute_hazards(&r).lds);
    }

    #[test]
    fn parse_row_columns() {
        let line = "gfx1030,0,256,64,65536,512,106,50,2,256,40,0,64,1,1,1000";
        let tokens = csv::tokenize(line).unwrap();
        let r = ResourceUsageRecord::parse_row(&tokens).unwrap();
        assert_eq!(r.device, "gfx1030");
        assert_eq!(r.threads_per_workgroup, 256);
        assert_eq!(r.wavefront_size, 64);
        assert_eq!(r.used_lds_bytes, 512);
        assert_eq!(r.available_sgprs, 106);
        assert_eq!(r.sgpr_spills, 2);
        assert_eq!(r.available_vgprs, 256);
        assert_eq!(r.used_vgprs, 40);
        assert_eq!(r.workgroup_dims, (64, 1, 1));
        assert_eq!(r.isa_size_bytes, 1000);
    }

    #[test]
    fn parse_row_non_numeric() {
        let line = "gfx1030,0,256,64,65536,lots,106,50,2,256,40,0,64,1,1,1000";
        let tokens = csv::tokenize(line).unwrap();
        match ResourceUsageRecord::parse_row(&tokens) {
            Err(Error::InvalidNumber { column, text }) => {
                assert_eq!(column, "USED_LDS_BYTES");
                assert_eq!(text, "lots");
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn summary_text() {
        let mut r = record();
        r.used_vgprs = 40;
        r.used_sgprs = 50;
        r.sgpr_spills = 2;
        r.isa_size_bytes = 40000;
        let report = ResourceUsageAnalyzer::default().report(&r);
        assert_eq!(
            report.to_string(),
            "VGPRs: 40 / 64 | SGPRs: 50 / 104 -> 2 spills | LDS: 0 / 64 KB | \
             Scratch memory: 0 B | Instruction cache: 40000 B / 32 KB"
        );
        assert!(report.hazards.overall());
    }

    #[test]
    fn icache_hidden_without_hazard() {
        let mut r = record();
        r.isa_size_bytes = 100;
        let report = ResourceUsageAnalyzer::default().report(&r);
        assert!(report.icache.is_some());
        assert!(!report.to_string().contains("Instruction cache"));
    }

    #[test]
    fn acronyms() {
        assert_eq!(size_acronym(0), "0 B");
        assert_eq!(size_acronym(1000), "1000 B");
        assert_eq!(size_acronym(1536), "1.5 KB");
        assert_eq!(size_acronym(65536), "64 KB");
        assert_eq!(size_acronym(3 * 1024 * 1024), "3 MB");
    }
}
