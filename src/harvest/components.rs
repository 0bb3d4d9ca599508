//! Typed fields read from product names
//!
//! Catalog listings pack most specifications into the product name, e.g.
//! `Kingston FURY Beast [KF432C16BBK2/16] 16 ГБ [DDR4, 8 ГБx2 шт, 3200 МГц, 16(CL)-18-18]`.
//! Each `ComponentKind` knows which specifications its names carry and pulls
//! them out with regular expressions. A specification that is not found is
//! left out of the record rather than filled with a placeholder.

use regex::{Captures, Regex};
use serde::Deserialize;
use std::fmt;
use std::sync::OnceLock;

/// Shared field produced for every kind: the name up to the first `[`
pub const FIELD_MODEL: &str = "model";

/// Compiles a constant pattern once; `None` only if the pattern is invalid
macro_rules! pattern {
    ($re:expr) => {{
        static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
        PATTERN.get_or_init(|| Regex::new($re).ok()).as_ref()
    }};
}

/// The product families the catalog is harvested for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ComponentKind {
    Ram,
    Cpu,
    Gpu,
    Motherboard,
    #[serde(alias = "air-cooler")]
    CpuCooler,
    #[serde(alias = "water-cooling")]
    CoolingSystem,
}

impl ComponentKind {
    /// Resolves a category id such as `ram` or `cpu_cooler`
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "ram" | "memory" => Some(Self::Ram),
            "cpu" | "processor" => Some(Self::Cpu),
            "gpu" | "videocard" => Some(Self::Gpu),
            "motherboard" => Some(Self::Motherboard),
            "cpu-cooler" | "air-cooler" => Some(Self::CpuCooler),
            "cooling-system" | "water-cooling" => Some(Self::CoolingSystem),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ram => "ram",
            Self::Cpu => "cpu",
            Self::Gpu => "gpu",
            Self::Motherboard => "motherboard",
            Self::CpuCooler => "cpu-cooler",
            Self::CoolingSystem => "cooling-system",
        }
    }

    /// Reads the specifications of this kind out of a product name
    pub fn parse_fields(&self, name: &str) -> Vec<(&'static str, String)> {
        let mut fields = Fields::default();
        fields.push(FIELD_MODEL, Some(model_name(name)));

        match self {
            Self::Ram => ram_fields(name, &mut fields),
            Self::Cpu => cpu_fields(name, &mut fields),
            Self::Gpu => gpu_fields(name, &mut fields),
            Self::Motherboard => motherboard_fields(name, &mut fields),
            Self::CpuCooler => cpu_cooler_fields(name, &mut fields),
            Self::CoolingSystem => cooling_system_fields(name, &mut fields),
        }

        fields.0
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Default)]
struct Fields(Vec<(&'static str, String)>);

impl Fields {
    fn push(&mut self, name: &'static str, value: Option<String>) {
        if let Some(value) = value.filter(|v| !v.is_empty()) {
            self.0.push((name, value));
        }
    }

    fn set(&mut self, name: &'static str, value: String) {
        self.0.retain(|(field, _)| *field != name);
        self.0.push((name, value));
    }
}

fn captures<'t>(re: Option<&Regex>, text: &'t str) -> Option<Captures<'t>> {
    re?.captures(text)
}

fn group(caps: &Captures<'_>, index: usize) -> Option<String> {
    caps.get(index).map(|m| m.as_str().trim().to_string())
}

fn first(re: Option<&Regex>, text: &str) -> Option<String> {
    captures(re, text).and_then(|caps| group(&caps, 1))
}

/// `16,5` and `16.5` both become `16.5`
fn number(value: Option<String>) -> Option<String> {
    value.map(|v| v.replace(',', "."))
}

fn capitalize(value: Option<String>) -> Option<String> {
    value.map(|v| {
        let lower = v.to_lowercase();
        let mut chars = lower.chars();
        match chars.next() {
            Some(c) => c.to_uppercase().chain(chars).collect(),
            None => lower,
        }
    })
}

fn model_name(name: &str) -> String {
    name.split('[').next().unwrap_or(name).trim().to_string()
}

fn ram_fields(name: &str, fields: &mut Fields) {
    fields.push(
        "capacity_gb",
        number(first(pattern!(r"(?i)(\d+(?:[.,]\d+)?)\s*(?:ГБ|GB)"), name)),
    );
    fields.push(
        "memory_type",
        first(pattern!(r"(?i)\b(DDR\d+)"), name).map(|t| t.to_uppercase()),
    );

    if let Some(caps) = captures(
        pattern!(r"(?i)(\d+(?:[.,]\d+)?)\s*(?:ГБ|GB)?\s*[xх]\s*(\d+)\s*шт"),
        name,
    ) {
        fields.push("module_size_gb", number(group(&caps, 1)));
        fields.push("module_count", group(&caps, 2));
    }

    fields.push(
        "frequency_mhz",
        number(first(pattern!(r"(?i)(\d+(?:[.,]\d+)?)\s*(?:МГц|MHz)"), name)),
    );

    let timings = captures(pattern!(r"(\d+)\(CL\)[\s-]*(\d+)[\s-]*(\d+)(?:[\s-]*(\d+))?"), name)
        .or_else(|| captures(pattern!(r"CL(\d+)[\s-]*(\d+)[\s-]*(\d+)(?:[\s-]*(\d+))?"), name))
        .or_else(|| captures(pattern!(r"\b(\d+)-(\d+)-(\d+)-(\d+)\b"), name));
    if let Some(caps) = timings {
        let parts: Vec<&str> = (1..=4)
            .filter_map(|i| caps.get(i).map(|m| m.as_str()))
            .collect();
        fields.push("timings", Some(parts.join("-")));
        fields.push("cas_latency", group(&caps, 1));
    }
}

fn cpu_fields(name: &str, fields: &mut Fields) {
    fields.push(
        "socket",
        first(pattern!(r"(?i)\b(LGA\s?\d+|AM\d\+?|FM\d\+?|Socket\s*\d+)"), name),
    );

    if let Some(caps) = captures(
        pattern!(r"(?i)(\d+)\s*(?:ядер|ядра|[xх])\s*(\d+(?:[.,]\d+)?)\s*ГГц"),
        name,
    ) {
        fields.push("cores", group(&caps, 1));
        fields.push("frequency_ghz", number(group(&caps, 2)));
    }

    fields.push(
        "l2_cache_mb",
        number(first(pattern!(r"(?i)L2\s*[-—]?\s*(\d+(?:[.,]\d+)?)\s*МБ"), name)),
    );
    fields.push(
        "l3_cache_mb",
        number(first(pattern!(r"(?i)L3\s*[-—]?\s*(\d+(?:[.,]\d+)?)\s*МБ"), name)),
    );
    fields.push(
        "memory_channels",
        first(pattern!(r"(?i)(\d+)\s*(?:[xх]|каналов|канала|канал)\s*DDR\d"), name),
    );
    fields.push(
        "tdp_w",
        number(first(pattern!(r"(?i)TDP\s*[-—]?\s*(\d+(?:[.,]\d+)?)\s*Вт"), name)),
    );
}

fn gpu_fields(name: &str, fields: &mut Fields) {
    fields.push(
        "memory_gb",
        number(first(pattern!(r"(?i)(\d+(?:[.,]\d+)?)\s*(?:ГБ|GB)"), name)),
    );
    fields.push(
        "memory_type",
        first(pattern!(r"(?i)\b(G?DDR\d+X?)"), name).map(|t| t.to_uppercase()),
    );
    fields.push("memory_bus_bits", first(pattern!(r"(\d+)\s*бит"), name));
    fields.push(
        "gpu_clock_mhz",
        number(first(pattern!(r"(?i)(\d+(?:[.,]\d+)?)\s*(?:МГц|MHz)"), name)),
    );
    fields.push(
        "pcie_version",
        first(pattern!(r"(?i)PCI-?E\s*(\d+(?:\.\d+)?)"), name),
    );

    let connectors: Vec<&str> = [
        ("DVI", pattern!(r"(?i)DVI")),
        ("HDMI", pattern!(r"(?i)HDMI")),
        ("VGA", pattern!(r"(?i)VGA|D-Sub")),
        ("DisplayPort", pattern!(r"(?i)DisplayPort|\bDP\b")),
    ]
    .into_iter()
    .filter(|(_, re)| re.is_some_and(|re| re.is_match(name)))
    .map(|(connector, _)| connector)
    .collect();
    fields.push("connectors", Some(connectors.join(", ")));
}

fn motherboard_fields(name: &str, fields: &mut Fields) {
    fields.push(
        "socket",
        first(
            pattern!(r"(?i)\b(LGA\s?\d+|AM\d\+?|FM\d\+?|BGA\d+|Socket\s*\d+)"),
            name,
        ),
    );

    if let Some(caps) = captures(pattern!(r"(?i)\b(Intel|AMD)\s+([A-Z]\d{2,3}[A-Z]?)\b"), name) {
        let chipset = [group(&caps, 1), group(&caps, 2)]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" ");
        fields.push("chipset", Some(chipset));
    }

    if let Some(caps) = captures(
        pattern!(r"(?i)(\d+)\s*x\s*(DDR\dL?)(?:[-\s]*(\d+))?\s*МГц"),
        name,
    ) {
        fields.push("memory_slots", group(&caps, 1));
        fields.push("memory_type", group(&caps, 2).map(|t| t.to_uppercase()));
        fields.push("memory_frequency_mhz", group(&caps, 3));
    }

    fields.push(
        "form_factor",
        first(
            pattern!(r"(?i)\b(E-ATX|XL-ATX|Micro-ATX|Mini-ITX|Mini-DTX|ATX)\b"),
            name,
        ),
    );

    if let Some(caps) = captures(pattern!(r"(?i)(\d+)\s*xPCI-Ex(\d+)"), name) {
        fields.push("pcie_slots", group(&caps, 1));
        fields.push("pcie_width", group(&caps, 2).map(|w| format!("x{}", w)));
    }
}

fn cpu_cooler_fields(name: &str, fields: &mut Fields) {
    fields.push(
        "base_material",
        capitalize(first(pattern!(r"(?i)основание\s*-\s*([\p{L}/]+)"), name)),
    );
    fields.push("fan_speed_rpm", first(pattern!(r"(\d+)\s*об/\s*мин"), name));
    fields.push(
        "noise_db",
        number(first(pattern!(r"(\d+(?:[.,]\d+)?)\s*дБ"), name)),
    );
    fields.push("power_connector_pins", first(pattern!(r"(?i)(\d+)\s*pin"), name));
    fields.push("max_tdp_w", first(pattern!(r"(\d+)\s*Вт"), name));
    fields.push("fan_size_mm", first(pattern!(r"(\d+)\s*мм"), name));
}

fn cooling_system_fields(name: &str, fields: &mut Fields) {
    let sections = first(pattern!(r"(\d+)\s*секци"), name);
    let fan_count = first(pattern!(r"(\d+)\s*вентилятор"), name).or_else(|| sections.clone());

    fields.push("fan_size_mm", first(pattern!(r"(\d+)\s*мм"), name));
    fields.push("sections", Some(sections.unwrap_or_else(|| "1".to_string())));
    fields.push("fan_count", Some(fan_count.unwrap_or_else(|| "1".to_string())));
    fields.push(
        "power",
        first(pattern!(r"(?i)(SATA Power|3 pin|4 pin|15 pin)"), name),
    );
    fields.push(
        "radiator_material",
        capitalize(first(pattern!(r"(?i)радиатор\s*-\s*(\p{L}+)"), name)),
    );
    fields.push("tdp_w", first(pattern!(r"(?i)TDP\s*(\d+)\s*Вт"), name));

    let lower = name.to_lowercase();
    let liquid = ["liquid", "water", "сжо", "жидкост"]
        .iter()
        .any(|word| lower.contains(word));
    fields.push(
        "cooling_type",
        Some(if liquid { "liquid" } else { "air" }.to_string()),
    );

    // radiator length in the model name gives the fan count of a liquid loop
    if liquid {
        let model = model_name(name);
        let by_radiator = [("360", "3"), ("240", "2"), ("120", "1")]
            .into_iter()
            .find(|(size, _)| model.contains(size));
        if let Some((_, count)) = by_radiator {
            fields.set("fan_count", count.to_string());
        }
    }
}
