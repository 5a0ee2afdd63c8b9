use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

pub const PLATFORM_MAIN_SECTIONS: &[&str] = &[
    "Preamble",
    "Principles",
    "Constitutional Issues",
    "Business, Commerce, and Transportation",
    "Finance",
    "Education",
    "Health and Human Services",
    "Criminal and Civil Justice",
    "State Affairs",
    "Government and Election Integrity",
    "National Defense and Foreign Affairs",
    "Resolutions",
];

pub const PLATFORM_SUB_SECTIONS: &[&str] = &[
    "Preservation of Constitution",
    "Citizen Rights",
    "State Sovereignty",
    "Markets and Regulation",
    "Retirement, Savings, Unions",
    "Energy and Environment",
    "Transportation",
    "COVID Response",
    "Privacy, Information Freedom, Internet",
    "Spending Restraint",
    "School Finance and Property Taxation",
    "Opposition to Market-Distorting Tax and Fiscal Subsidies",
    "Transparency and Oversight",
    "Parents' Rights",
    "Curriculum",
    "Governance",
    "Higher Education",
    "Healthcare Independence",
    "Government-funded Health Programs",
    "Mental Health",
    "Homosexuality and Gender Issues",
    "Substance Abuse and Addiction",
    "Life-Affirming Health Care Concepts",
    "Environmental Health",
    "Rights and Protections",
    "Courts, Prosecutions, Restitution",
    "Law Enforcement",
    "Family Law",
    "Heritage Preservation",
    "Individual Rights and Freedoms",
    "Family and Gender Issues",
    "Pro-Life Issues",
    "Land Use",
    "State Governance",
    "Government Operations",
    "Elections",
    "Veterans Affairs",
    "Border Security and Immigration",
    "Foreign Affairs",
];

pub const PLATFORM_ENTRY_PATTERN: &str = r"^[ \t]*(\d+)\.\s+([A-Z].*)";
pub const BILL_ARTICLE_PATTERN: &str = r"^[ \t]*ARTICLE\s+(\d+)\.\s+([A-Z\s,]+)$";
pub const BILL_SECTION_PATTERN: &str = r"^[ \t]*(?:SECTION|Sec\.)\s+([\d\w][\d\w.]*)";
pub const BILL_MIN_CHUNK_CHARS: usize = 50;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFamily {
    Platform,
    Bill,
}

impl DocumentFamily {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Platform => "platform",
            Self::Bill => "bill",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BoundaryMarkers {
    pub start: String,
    pub end: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmenterConfig {
    pub family: DocumentFamily,
    #[serde(default)]
    pub main_sections: Vec<String>,
    #[serde(default)]
    pub sub_sections: Vec<String>,
    #[serde(default)]
    pub heading_pattern: Option<String>,
    pub entry_pattern: String,
    #[serde(default)]
    pub boundary: Option<BoundaryMarkers>,
    #[serde(default)]
    pub min_chunk_chars: usize,
}

impl SegmenterConfig {
    pub fn platform() -> Self {
        Self {
            family: DocumentFamily::Platform,
            main_sections: to_owned_list(PLATFORM_MAIN_SECTIONS),
            sub_sections: to_owned_list(PLATFORM_SUB_SECTIONS),
            heading_pattern: None,
            entry_pattern: PLATFORM_ENTRY_PATTERN.to_string(),
            boundary: Some(BoundaryMarkers {
                start: "Preamble".to_string(),
                end: "Index".to_string(),
            }),
            min_chunk_chars: 0,
        }
    }

    pub fn bill() -> Self {
        Self {
            family: DocumentFamily::Bill,
            main_sections: Vec::new(),
            sub_sections: Vec::new(),
            heading_pattern: Some(BILL_ARTICLE_PATTERN.to_string()),
            entry_pattern: BILL_SECTION_PATTERN.to_string(),
            boundary: None,
            min_chunk_chars: BILL_MIN_CHUNK_CHARS,
        }
    }

    pub fn for_family(family: DocumentFamily) -> Self {
        match family {
            DocumentFamily::Platform => Self::platform(),
            DocumentFamily::Bill => Self::bill(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<SegmenterConfig> {
    let raw =
        fs::read(path).with_context(|| format!("failed to read config {}", path.display()))?;
    let config: SegmenterConfig = serde_json::from_slice(&raw)
        .with_context(|| format!("failed to parse config {}", path.display()))?;
    Ok(config)
}

pub fn resolve_config(
    config_path: Option<&Path>,
    family: DocumentFamily,
    min_chunk_chars: Option<usize>,
) -> Result<SegmenterConfig> {
    let mut config = match config_path {
        Some(path) => load_config(path)?,
        None => SegmenterConfig::for_family(family),
    };

    if let Some(min_chars) = min_chunk_chars {
        config.min_chunk_chars = min_chars;
    }

    Ok(config)
}

fn to_owned_list(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}
