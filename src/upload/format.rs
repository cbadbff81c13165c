//! Artifact format and content type detection

use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Bytes of JSON content inspected when the name is inconclusive
const SNIFF_BYTES: usize = 2048;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactFormat {
    CycloneDx,
    Spdx,
    Sarif,
    OpenVex,
    CsafVex,
    /// Let the server decide
    Auto,
}

impl ArtifactFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactFormat::CycloneDx => "cyclonedx",
            ArtifactFormat::Spdx => "spdx",
            ArtifactFormat::Sarif => "sarif",
            ArtifactFormat::OpenVex => "openvex",
            ArtifactFormat::CsafVex => "csaf_vex",
            ArtifactFormat::Auto => "auto",
        }
    }
}

impl fmt::Display for ArtifactFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArtifactFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cyclonedx" => Ok(ArtifactFormat::CycloneDx),
            "spdx" => Ok(ArtifactFormat::Spdx),
            "sarif" => Ok(ArtifactFormat::Sarif),
            "openvex" => Ok(ArtifactFormat::OpenVex),
            "csaf_vex" | "csaf" => Ok(ArtifactFormat::CsafVex),
            "auto" => Ok(ArtifactFormat::Auto),
            other => Err(format!(
                "unknown format '{}': expected cyclonedx, spdx, sarif, openvex, csaf_vex or auto",
                other
            )),
        }
    }
}

/// Detect the artifact format from the file name, then from JSON content
pub fn detect_format(path: &Path, data: &[u8]) -> ArtifactFormat {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();

    if name.contains(".cdx.") || name.contains("cyclonedx") {
        return ArtifactFormat::CycloneDx;
    }
    if name.contains("spdx") {
        return ArtifactFormat::Spdx;
    }
    if name.contains(".sarif") {
        return ArtifactFormat::Sarif;
    }
    if name.contains(".vex.") || name.contains("openvex") {
        return ArtifactFormat::OpenVex;
    }
    if name.contains("csaf") {
        return ArtifactFormat::CsafVex;
    }

    let is_json = path
        .extension()
        .map(|e| e.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    if is_json && !data.is_empty() {
        let head = String::from_utf8_lossy(&data[..data.len().min(SNIFF_BYTES)]);
        if head.contains("\"bomFormat\"") || head.contains("\"specVersion\"") {
            return ArtifactFormat::CycloneDx;
        }
        if head.contains("\"spdxVersion\"") {
            return ArtifactFormat::Spdx;
        }
        if head.contains("\"$schema\"") && head.contains("sarif") {
            return ArtifactFormat::Sarif;
        }
        if head.contains("\"@context\"") && head.contains("openvex") {
            return ArtifactFormat::OpenVex;
        }
    }

    ArtifactFormat::Auto
}

/// MIME type declared at session initiation
pub fn content_type(file_name: &str) -> &'static str {
    if file_name.ends_with(".json") {
        "application/json"
    } else if file_name.ends_with(".xml") {
        "application/xml"
    } else {
        "application/octet-stream"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_from_name() {
        let cases = [
            ("bom.cdx.json", ArtifactFormat::CycloneDx),
            ("app-cyclonedx.xml", ArtifactFormat::CycloneDx),
            ("sbom.spdx.json", ArtifactFormat::Spdx),
            ("results.sarif", ArtifactFormat::Sarif),
            ("product.vex.json", ArtifactFormat::OpenVex),
            ("advisory-csaf.json", ArtifactFormat::CsafVex),
        ];
        for (name, expected) in cases {
            assert_eq!(detect_format(Path::new(name), b""), expected, "{name}");
        }
    }

    #[test]
    fn test_detect_from_content() {
        let path = Path::new("report.json");
        assert_eq!(
            detect_format(path, br#"{"bomFormat":"CycloneDX","specVersion":"1.5"}"#),
            ArtifactFormat::CycloneDx
        );
        assert_eq!(detect_format(path, br#"{"spdxVersion":"SPDX-2.3"}"#), ArtifactFormat::Spdx);
        assert_eq!(
            detect_format(path, br#"{"$schema":"https://json.schemastore.org/sarif-2.1.0.json"}"#),
            ArtifactFormat::Sarif
        );
        assert_eq!(
            detect_format(path, br#"{"@context":"https://openvex.dev/ns/v0.2.0"}"#),
            ArtifactFormat::OpenVex
        );
        assert_eq!(detect_format(path, br#"{"hello":"world"}"#), ArtifactFormat::Auto);
    }

    #[test]
    fn test_content_sniff_only_for_json() {
        assert_eq!(
            detect_format(Path::new("report.txt"), br#"{"bomFormat":"CycloneDX"}"#),
            ArtifactFormat::Auto
        );
    }

    #[test]
    fn test_content_type() {
        assert_eq!(content_type("a.json"), "application/json");
        assert_eq!(content_type("a.xml"), "application/xml");
        assert_eq!(content_type("a.zip"), "application/octet-stream");
    }

    #[test]
    fn test_parse_format() {
        assert_eq!("CycloneDX".parse::<ArtifactFormat>().unwrap(), ArtifactFormat::CycloneDx);
        assert_eq!("csaf_vex".parse::<ArtifactFormat>().unwrap(), ArtifactFormat::CsafVex);
        assert!("pdf".parse::<ArtifactFormat>().is_err());
    }
}
