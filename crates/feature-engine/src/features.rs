//! Feature Vector Assembly

use classifier::{FeatureArray, FEATURE_DIMENSION};
use serde::{Deserialize, Serialize};

/// The nine features of one window, in classifier input order
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FeatureVector {
    /// Kurtosis of the normalized instantaneous frequency
    #[serde(rename = "mu42F")]
    pub mu42_f: f64,
    /// Std-dev of the normalized instantaneous frequency
    #[serde(rename = "sigmaAF")]
    pub sigma_af: f64,
    /// Std-dev of the non-linear phase component
    #[serde(rename = "sigmaDP")]
    pub sigma_dp: f64,
    /// Std-dev of the absolute non-linear phase component
    #[serde(rename = "sigmaAP")]
    pub sigma_ap: f64,
    /// Maximum spectral power density of the normalized window
    #[serde(rename = "gammaMax")]
    pub gamma_max: f64,
    /// Spectral symmetry about the carrier
    #[serde(rename = "P")]
    pub p: f64,
    /// Std-dev of the normalized-centered window
    #[serde(rename = "sigmaA")]
    pub sigma_a: f64,
    /// Kurtosis of the normalized-centered window
    #[serde(rename = "mu42A")]
    pub mu42_a: f64,
    /// Std-dev of the absolute normalized-centered amplitude
    #[serde(rename = "sigmaAA")]
    pub sigma_aa: f64,
}

impl FeatureVector {
    /// Feature names in array order
    pub const NAMES: [&'static str; FEATURE_DIMENSION] = [
        "mu42F", "sigmaAF", "sigmaDP", "sigmaAP", "gammaMax", "P", "sigmaA", "mu42A", "sigmaAA",
    ];

    pub fn to_array(&self) -> FeatureArray {
        [
            self.mu42_f,
            self.sigma_af,
            self.sigma_dp,
            self.sigma_ap,
            self.gamma_max,
            self.p,
            self.sigma_a,
            self.mu42_a,
            self.sigma_aa,
        ]
    }

    pub fn from_array(values: &FeatureArray) -> Self {
        Self {
            mu42_f: values[0],
            sigma_af: values[1],
            sigma_dp: values[2],
            sigma_ap: values[3],
            gamma_max: values[4],
            p: values[5],
            sigma_a: values[6],
            mu42_a: values[7],
            sigma_aa: values[8],
        }
    }

    pub fn to_vec(&self) -> Vec<f64> {
        self.to_array().to_vec()
    }

    /// True when no feature is NaN or infinite
    pub fn is_finite(&self) -> bool {
        self.to_array().iter().all(|v| v.is_finite())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_array_order() {
        let v = FeatureVector {
            mu42_f: 0.0,
            sigma_af: 1.0,
            sigma_dp: 2.0,
            sigma_ap: 3.0,
            gamma_max: 4.0,
            p: 5.0,
            sigma_a: 6.0,
            mu42_a: 7.0,
            sigma_aa: 8.0,
        };
        let array = v.to_array();
        for (i, value) in array.iter().enumerate() {
            assert_eq!(*value, i as f64);
        }
        assert_eq!(FeatureVector::from_array(&array), v);
        assert_eq!(v.to_vec().len(), FEATURE_DIMENSION);
    }

    #[test]
    fn test_serialized_names_match() {
        let json = serde_json::to_string(&FeatureVector::default()).unwrap();
        let mut last = 0;
        for name in FeatureVector::NAMES {
            let pos = json.find(&format!("\"{}\":", name)).unwrap();
            assert!(pos >= last, "{} out of order", name);
            last = pos;
        }
    }
}
