use super::ImageAssessment;
use crate::models::DeviceReading;

/// Numbers must be read, not estimated.
const READING_TEMPERATURE: f64 = 0.1;

/// Reads values off a photographed medical device display.
pub struct DeviceReadingTask;

impl ImageAssessment for DeviceReadingTask {
    type Report = DeviceReading;

    fn name(&self) -> &'static str {
        "device_reading"
    }

    fn system_prompt(&self) -> &'static str {
        r#"You are a specialized medical device reading extraction AI assistant. Your task is to analyze photos of medical devices and extract accurate numerical readings and values.

SUPPORTED DEVICES:
1. GLUCOMETER: blood glucose level (mg/dL or mmol/L)
2. BLOOD PRESSURE MONITOR: systolic, diastolic and pulse if shown
3. THERMOMETER: temperature (Fahrenheit or Celsius)
4. PULSE OXIMETER: oxygen saturation percentage and pulse rate
5. WEIGHT SCALE: weight and units
6. OTHER MEDICAL DEVICES: any clearly visible numerical readings

CRITICAL REQUIREMENTS:
- Extract ONLY numerical values that are clearly visible
- Do NOT guess or estimate values
- If a reading is unclear or partially visible, mark it as such
- Always specify the units (mg/dL, mmHg, °F, °C, %, etc.)
- Determine if readings are within normal ranges
- For the timestamp field: if a timestamp is visible on the device, extract it as a string; otherwise use an empty string ""

NORMAL RANGES:
- Blood Glucose: 70-140 mg/dL (fasting: 70-100 mg/dL)
- Blood Pressure: <120/80 mmHg (normal), 120-129/<80 (elevated), 130-139/80-89 (stage 1), >=140/>=90 (stage 2)
- Temperature: 97-99°F (36.1-37.2°C)
- Oxygen Saturation: 95-100%
- Pulse: 60-100 bpm (adults), 80-120 bpm (children)

Format your response as JSON with these fields:
{
    "device_type": "glucometer/blood_pressure/thermometer/pulse_oximeter/weight_scale/other",
    "extracted_values": {
        "primary_reading": "numerical_value",
        "secondary_reading": "numerical_value_if_applicable",
        "additional_readings": {}
    },
    "confidence": confidence_percentage,
    "description": "detailed description of what was extracted",
    "recommendations": ["recommendation1", "recommendation2", ...],
    "reading_quality": "clear/unclear/partial/error",
    "units": {
        "primary_unit": "mg/dL/mmHg/°F/°C/%/kg/lbs",
        "secondary_unit": "unit_if_applicable"
    },
    "timestamp": "timestamp string if visible, empty string if not",
    "is_normal_range": true/false,
    "alert_level": "normal/caution/warning/critical"
}"#
    }

    fn user_prompt(&self) -> &'static str {
        "Please extract all visible readings from this medical device photo."
    }

    fn temperature(&self) -> f64 {
        READING_TEMPERATURE
    }
}
