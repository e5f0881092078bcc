//! Normalization and the hard-coded advisories used when nothing better exists.

use time::OffsetDateTime;
use uuid::Uuid;

use super::dto::{Advisory, Severity, TreatmentStep};

pub const DEFAULT_RECOVERY_TIME: &str = "2-4 weeks";
pub const DEFAULT_PESTICIDE: &str = "Consult local agricultural store";
pub const DEFAULT_FERTILIZER: &str = "Balanced NPK fertilizer";

impl Advisory {
    /// Fills required fields that are blank and guarantees at least one
    /// treatment step. Applied on every write path.
    pub fn normalized(mut self) -> Self {
        self.disease_name = self.disease_name.trim().to_string();
        self.crop_type = self.crop_type.trim().to_string();

        if self.description.trim().is_empty() {
            self.description = format!("Disease detected in {} crop.", self.crop_type);
        }

        self.symptoms.retain(|s| !s.trim().is_empty());
        self.prevention_tips.retain(|s| !s.trim().is_empty());
        self.treatment_steps
            .retain(|s| !s.description.trim().is_empty());
        if self.treatment_steps.is_empty() {
            self.treatment_steps = default_treatment_steps();
        }

        if self.estimated_recovery_time.trim().is_empty() {
            self.estimated_recovery_time = DEFAULT_RECOVERY_TIME.to_string();
        }

        self.recommended_pesticide = non_blank(self.recommended_pesticide);
        self.recommended_fertilizer = non_blank(self.recommended_fertilizer);
        self.organic_alternatives = non_blank(self.organic_alternatives);
        self.when_to_seek_help = non_blank(self.when_to_seek_help);
        self
    }
}

fn non_blank(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

pub fn default_treatment_steps() -> Vec<TreatmentStep> {
    vec![
        TreatmentStep::new(
            1,
            "Remove and destroy affected plant parts",
            &["Pruning shears", "Disposal bags"],
        ),
        TreatmentStep::new(
            2,
            "Apply recommended treatment",
            &["Appropriate pesticide/fungicide"],
        ),
    ]
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[allow(clippy::too_many_arguments)]
fn advisory(
    disease: &str,
    crop: &str,
    description: &str,
    symptoms: &[&str],
    steps: Vec<TreatmentStep>,
    pesticide: &str,
    fertilizer: &str,
    prevention: &[&str],
    recovery: &str,
) -> Advisory {
    Advisory {
        id: Uuid::new_v4(),
        disease_name: disease.to_string(),
        crop_type: crop.to_string(),
        severity: Severity::Moderate,
        description: description.to_string(),
        symptoms: strings(symptoms),
        treatment_steps: steps,
        recommended_pesticide: Some(pesticide.to_string()),
        recommended_fertilizer: Some(fertilizer.to_string()),
        prevention_tips: strings(prevention),
        estimated_recovery_time: recovery.to_string(),
        organic_alternatives: None,
        when_to_seek_help: None,
        created_at: OffsetDateTime::now_utc(),
    }
    .normalized()
}

/// General (crop-agnostic) advisories shipped with the service.
pub fn builtin(disease: &str) -> Option<Advisory> {
    let key = disease.trim().to_ascii_lowercase();
    match key.as_str() {
        "bacterial_spot" => Some(advisory(
            "Bacterial_Spot",
            "General",
            "Bacterial spot causes small, dark spots on leaves and fruits.",
            &[
                "Small dark spots on leaves",
                "Water-soaked lesions",
                "Yellowing around spots",
            ],
            vec![
                TreatmentStep::new(1, "Remove affected plant parts", &["Pruning shears", "Disinfectant"]),
                TreatmentStep::new(2, "Apply copper-based fungicide", &["Copper fungicide", "Sprayer"]),
                TreatmentStep::new(3, "Improve air circulation", &["Pruning tools"]),
            ],
            "Copper hydroxide",
            "Balanced NPK fertilizer",
            &[
                "Avoid overhead watering",
                "Ensure proper plant spacing",
                "Remove plant debris regularly",
            ],
            "2-3 weeks",
        )),
        "early_blight" => Some(advisory(
            "Early_Blight",
            "General",
            "Early blight causes brown spots with concentric rings on leaves.",
            &[
                "Brown spots with target-like rings",
                "Yellowing of lower leaves",
                "Defoliation",
            ],
            vec![
                TreatmentStep::new(1, "Remove infected leaves", &["Gloves", "Pruning shears"]),
                TreatmentStep::new(2, "Apply fungicide", &["Chlorothalonil fungicide", "Sprayer"]),
                TreatmentStep::new(3, "Mulch around plants", &["Organic mulch"]),
            ],
            "Chlorothalonil",
            "Potassium-rich fertilizer",
            &[
                "Practice crop rotation",
                "Water at soil level",
                "Maintain good air circulation",
            ],
            "3-4 weeks",
        )),
        _ => None,
    }
}

/// Last-resort advisory for any disease and crop.
pub fn generic(disease: &str, crop: &str) -> Advisory {
    let mut adv = advisory(
        disease,
        crop,
        &format!(
            "{disease} has been detected in your {crop} crop. Immediate action is recommended to prevent spread."
        ),
        &[
            "Visible spots or discoloration on leaves",
            "Wilting or drooping of plant parts",
            "Unusual growth patterns",
            "Fruit or vegetable damage",
        ],
        vec![
            TreatmentStep::new(
                1,
                "Immediately isolate affected plants to prevent disease spread to healthy crops",
                &["Gloves", "Pruning tools"],
            ),
            TreatmentStep::new(
                2,
                "Remove and safely destroy all infected plant material by burning or deep burial",
                &["Disposal bags", "Disinfectant"],
            ),
            TreatmentStep::new(
                3,
                "Apply appropriate fungicide or pesticide as recommended by local agricultural experts",
                &["Sprayer", "Recommended pesticide"],
            ),
            TreatmentStep::new(
                4,
                "Monitor remaining plants daily for signs of disease spread",
                &["Observation log"],
            ),
        ],
        "Consult with local agricultural extension officer for region-specific recommendations",
        "Balanced NPK fertilizer to support plant recovery",
        &[
            "Practice crop rotation each growing season",
            "Ensure proper plant spacing for good air circulation",
            "Water at the base of plants, avoid wetting leaves",
            "Remove plant debris and weeds regularly",
            "Use disease-resistant varieties when available",
            "Maintain proper soil drainage",
            "Sterilize tools between uses",
        ],
        "2-4 weeks with proper treatment and monitoring",
    );
    adv.organic_alternatives = Some(
        "Neem oil spray, copper-based organic fungicides, or biological control agents may be effective."
            .to_string(),
    );
    adv.when_to_seek_help = Some(
        "If disease spreads rapidly despite treatment or affects large areas of the crop, contact your local agricultural extension officer."
            .to_string(),
    );
    adv
}

/// Crop-specific advisories inserted into an empty store at boot.
pub fn seed_advisories() -> Vec<Advisory> {
    vec![advisory(
        "Bacterial_Spot",
        "Tomato",
        "Bacterial spot is a common disease affecting tomato plants.",
        &[
            "Small dark spots on leaves",
            "Water-soaked lesions",
            "Fruit spotting",
        ],
        vec![
            TreatmentStep::new(1, "Remove affected leaves immediately", &["Sterile pruning shears", "Disinfectant"]),
            TreatmentStep::new(2, "Apply copper-based bactericide", &["Copper bactericide", "Sprayer"]),
            TreatmentStep::new(3, "Improve ventilation around plants", &["Stakes", "Ties"]),
        ],
        "Copper hydroxide spray",
        "Low nitrogen, high potassium fertilizer",
        &[
            "Avoid overhead irrigation",
            "Practice crop rotation",
            "Use certified disease-free seeds",
            "Maintain proper plant spacing",
        ],
        "2-3 weeks with proper treatment",
    )]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalization_adds_treatment_steps_when_empty() {
        let mut adv = generic("Leaf_Spot", "bean");
        adv.treatment_steps.clear();
        adv.estimated_recovery_time = "  ".into();
        adv.recommended_pesticide = Some(String::new());

        let adv = adv.normalized();
        assert!(!adv.treatment_steps.is_empty());
        assert_eq!(adv.treatment_steps[0].step, 1);
        assert_eq!(adv.estimated_recovery_time, DEFAULT_RECOVERY_TIME);
        assert_eq!(adv.recommended_pesticide, None);
    }

    #[test]
    fn builtin_lookup_ignores_case() {
        let adv = builtin("early_BLIGHT").expect("builtin early blight");
        assert_eq!(adv.disease_name, "Early_Blight");
        assert_eq!(adv.crop_type, "General");
        assert!(builtin("Mosaic_Virus").is_none());
    }

    #[test]
    fn generic_advisory_is_complete() {
        let adv = generic("Unknown_Rot", "cassava");
        assert_eq!(adv.disease_name, "Unknown_Rot");
        assert_eq!(adv.crop_type, "cassava");
        assert_eq!(adv.severity, Severity::Moderate);
        assert_eq!(adv.treatment_steps.len(), 4);
        assert!(adv.treatment_steps[0].description.contains("isolate"));
        assert!(!adv.prevention_tips.is_empty());
        assert!(!adv.symptoms.is_empty());
    }

    #[test]
    fn seed_contains_tomato_bacterial_spot() {
        let seeds = seed_advisories();
        assert!(seeds
            .iter()
            .any(|a| a.disease_name == "Bacterial_Spot" && a.crop_type == "Tomato"));
    }
}
