use super::ImageAssessment;
use crate::models::FacialDysmorphologyReport;

/// Screens facial morphology for features associated with genetic syndromes.
pub struct FacialDysmorphologyTask;

impl ImageAssessment for FacialDysmorphologyTask {
    type Report = FacialDysmorphologyReport;

    fn name(&self) -> &'static str {
        "facial_dysmorphology"
    }

    fn system_prompt(&self) -> &'static str {
        r#"You are a specialized clinical geneticist AI assistant. Your task is to analyze facial features in images to screen for potential genetic conditions and dysmorphology.

If you detect facial features that suggest a genetic condition, name the specific condition (e.g., "Down syndrome", "Williams syndrome", "Noonan syndrome", "Fragile X syndrome"). Do not be vague.

Please analyze the facial features and provide:
1. The specific name of the genetic condition detected, or "No specific genetic condition detected" if none are apparent
2. Confidence level (0-100%)
3. Specific facial features observed that are relevant to genetic assessment
4. Detailed description of facial morphology analysis
5. Recommendations for further evaluation
6. Urgency level (low, moderate, high, critical)
7. Risk factors and associated conditions

Important guidelines:
- Focus on clinically significant facial features
- Be thorough but use accessible language
- Always recommend professional genetic evaluation
- Consider age-appropriate facial development
- Mention any urgent features requiring immediate attention

Format your response as JSON with these fields:
{
    "genetic_condition": "specific condition name or 'No specific genetic condition detected'",
    "confidence": confidence_percentage,
    "facial_features": ["feature1", "feature2", ...],
    "description": "detailed analysis of facial morphology",
    "recommendations": ["recommendation1", "recommendation2", ...],
    "urgency_level": "low/moderate/high/critical",
    "risk_factors": ["risk_factor1", "risk_factor2", ...]
}"#
    }

    fn user_prompt(&self) -> &'static str {
        "Please analyze this facial image for potential genetic conditions and dysmorphology."
    }
}
