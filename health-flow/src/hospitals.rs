//! Static hospital directory exposed to the model as the `findHospitals` tool.

use serde_json::Value;

use crate::capability::{EmergencyAvailability, HospitalRecord, hospital_record_type};
use crate::schema::{Field, Schema, SchemaType};
use crate::tool::ToolDescriptor;

use EmergencyAvailability::{Available, OnCall, Unavailable};

pub const FIND_HOSPITALS_TOOL: &str = "findHospitals";

pub const SUPPORTED_CITIES: &[&str] = &[
    "Mumbai",
    "Delhi",
    "Bangalore",
    "Hyderabad",
    "Ahmedabad",
    "Chennai",
    "Kolkata",
    "Pune",
    "Jaipur",
    "Lucknow",
];

struct Entry {
    name: &'static str,
    address: &'static str,
    distance: &'static str,
    services: &'static [&'static str],
    availability: EmergencyAvailability,
}

const fn entry(
    name: &'static str,
    address: &'static str,
    distance: &'static str,
    services: &'static [&'static str],
    availability: EmergencyAvailability,
) -> Entry {
    Entry {
        name,
        address,
        distance,
        services,
        availability,
    }
}

impl Entry {
    fn to_record(&self) -> HospitalRecord {
        HospitalRecord {
            name: self.name.to_string(),
            address: self.address.to_string(),
            distance: self.distance.to_string(),
            services: self.services.iter().map(|s| s.to_string()).collect(),
            emergency_doctor_availability: self.availability,
        }
    }
}

#[rustfmt::skip]
const DIRECTORY: &[(&str, &[Entry])] = &[
    ("Mumbai", &[
        entry("Bombay Hospital & Medical Research Centre", "12, Marine Lines, Mumbai", "2.1 km", &["Cardiology", "Neurology", "Oncology"], Available),
        entry("Lilavati Hospital and Research Centre", "Bandra Reclamation, Mumbai", "5.5 km", &["Orthopedics", "Pediatrics", "Emergency"], OnCall),
        entry("H. N. Reliance Foundation Hospital", "Prarthana Samaj, Girgaon, Mumbai", "3.8 km", &["Multi-specialty", "Diagnostics", "Wellness"], Available),
        entry("Kokilaben Dhirubhai Ambani Hospital", "Four Bungalows, Andheri West, Mumbai", "12 km", &["Robotic Surgery", "Cancer Care", "Neurosciences"], Available),
        entry("Wockhardt Hospital", "Mumbai Central, Mumbai", "4.2 km", &["Cardiac Care", "Urology", "Gastroenterology"], Unavailable),
    ]),
    ("Delhi", &[
        entry("All India Institute of Medical Sciences (AIIMS)", "Ansari Nagar, New Delhi", "3.0 km", &["General Medicine", "Surgery", "Trauma"], Available),
        entry("Max Healthcare", "Saket, New Delhi", "8.2 km", &["Cardiology", "Radiology", "Emergency"], Available),
        entry("Indraprastha Apollo Hospitals", "Sarita Vihar, Delhi Mathura Road, New Delhi", "15 km", &["Transplants", "Pediatrics", "Oncology"], OnCall),
        entry("Fortis Escorts Heart Institute", "Okhla road, New Delhi", "13 km", &["Cardiac Surgery", "Interventional Cardiology"], Available),
        entry("Sir Ganga Ram Hospital", "Rajinder Nagar, New Delhi", "5.5 km", &["Multi-specialty", "Research", "Emergency"], Unavailable),
    ]),
    ("Bangalore", &[
        entry("Manipal Hospital", "HAL Airport Road, Bangalore", "4.5 km", &["Multi-specialty", "Emergency", "Diagnostics"], OnCall),
        entry("Fortis Hospital", "Bannerghatta Road, Bangalore", "10 km", &["Cardiac Care", "Urology", "Neurology"], Unavailable),
        entry("Narayana Health City", "Bommasandra Industrial Area, Bangalore", "22 km", &["Heart", "Cancer", "Multi-specialty"], Available),
        entry("Sakra World Hospital", "Devarabisanahalli, Marathahalli, Bangalore", "14 km", &["Orthopedics", "Neurosciences", "Rehabilitation"], Available),
        entry("Apollo Hospitals", "Jayanagar, Bangalore", "8 km", &["Multi-specialty", "Emergency", "Preventive Health"], OnCall),
    ]),
    ("Hyderabad", &[
        entry("Apollo Hospitals, Jubilee Hills", "Jubilee Hills, Hyderabad", "6 km", &["Multi-specialty", "Emergency", "Robotics"], Available),
        entry("Yashoda Hospitals", "Somajiguda, Hyderabad", "3 km", &["Cancer", "Neuro", "Cardiac"], OnCall),
        entry("Continental Hospitals", "Gachibowli, Hyderabad", "15 km", &["Multi-specialty", "Trauma", "Wellness"], Available),
        entry("Care Hospitals", "Banjara Hills, Hyderabad", "5 km", &["Cardiac", "Neurology", "Orthopedics"], Unavailable),
        entry("Sunshine Hospitals", "Secunderabad, Hyderabad", "8 km", &["Orthopedics", "Joint Replacement", "Trauma"], Available),
    ]),
    ("Ahmedabad", &[
        entry("Sterling Hospital", "Memnagar, Ahmedabad", "7 km", &["Multi-specialty", "Critical Care", "Diagnostics"], Available),
        entry("Shalby Hospitals", "SG Highway, Ahmedabad", "12 km", &["Orthopedics", "Joint Replacement", "Spine"], OnCall),
        entry("CIMS Hospital", "Science City Road, Ahmedabad", "10 km", &["Cardiology", "Oncology", "Transplants"], Available),
        entry("Narayana Multispeciality Hospital", "Rakhial, Ahmedabad", "5 km", &["Heart", "Neurology", "Nephrology"], Unavailable),
        entry("Apollo Hospitals", "Bhat, Gandhinagar, Ahmedabad", "18 km", &["Multi-specialty", "Emergency", "Preventive Care"], Available),
    ]),
    ("Chennai", &[
        entry("Apollo Hospitals, Greams Road", "Greams Road, Chennai", "2 km", &["Multi-specialty", "Emergency", "Cancer Care"], Available),
        entry("Fortis Malar Hospital", "Adyar, Chennai", "8 km", &["Cardiac", "Transplants", "Neurology"], OnCall),
        entry("MIOT International", "Manapakkam, Chennai", "15 km", &["Orthopedics", "Trauma", "Nephrology"], Available),
        entry("Kauvery Hospital", "Alwarpet, Chennai", "5 km", &["Multi-specialty", "Emergency", "Diabetology"], Unavailable),
        entry("Global Hospitals", "Perumbakkam, Chennai", "20 km", &["Liver Transplant", "Cardiac", "Neuro"], Available),
    ]),
    ("Kolkata", &[
        entry("Apollo Gleneagles Hospitals", "Canal Circular Road, Kolkata", "7 km", &["Multi-specialty", "Robotics", "Emergency"], Available),
        entry("Fortis Hospital, Anandapur", "Anandapur, Kolkata", "10 km", &["Cardiac", "Neurology", "Kidney"], OnCall),
        entry("Peerless Hospital", "Panchasayar, Kolkata", "12 km", &["Multi-specialty", "Cardiac", "Gastroenterology"], Available),
        entry("AMRI Hospitals", "Dhakuria, Kolkata", "5 km", &["Trauma", "Orthopedics", "Oncology"], Unavailable),
        entry("Medica Superspecialty Hospital", "Mukundapur, Kolkata", "11 km", &["Heart", "Neuro", "Critical Care"], Available),
    ]),
    ("Pune", &[
        entry("Ruby Hall Clinic", "Sassoon Road, Pune", "3 km", &["Multi-specialty", "Cancer", "Transplants"], Available),
        entry("Jehangir Hospital", "Sassoon Road, Pune", "3.5 km", &["Emergency", "ICU", "Multi-specialty"], OnCall),
        entry("Deenanath Mangeshkar Hospital", "Erandwane, Pune", "6 km", &["Multi-specialty", "Research", "Critical Care"], Available),
        entry("Sahyadri Super Speciality Hospital", "Deccan Gymkhana, Pune", "5 km", &["Neurology", "Orthopedics", "Urology"], Unavailable),
        entry("Aditya Birla Memorial Hospital", "Chinchwad, Pune", "18 km", &["Multi-specialty", "Wellness", "Emergency"], Available),
    ]),
    ("Jaipur", &[
        entry("Fortis Escorts Hospital", "Malviya Nagar, Jaipur", "8 km", &["Cardiac", "Neuro", "Orthopedics"], Available),
        entry("Narayana Multispeciality Hospital", "Pratap Nagar, Jaipur", "12 km", &["Multi-specialty", "Heart", "Cancer"], OnCall),
        entry("Manipal Hospital", "Vidhyadhar Nagar, Jaipur", "7 km", &["Emergency", "Multi-specialty", "Diagnostics"], Available),
        entry("SMS Hospital", "JLN Marg, Jaipur", "4 km", &["Public Hospital", "Trauma", "General Medicine"], Unavailable),
        entry("Apex Hospital", "Malviya Nagar, Jaipur", "8.5 km", &["Multi-specialty", "Critical Care", "IVF"], Available),
    ]),
    ("Lucknow", &[
        entry("Medanta Hospital", "Amar Shaheed Path, Lucknow", "15 km", &["Multi-specialty", "Cardiac", "Oncology"], Available),
        entry("Apollomedics Super Speciality Hospital", "LDA Colony, Lucknow", "10 km", &["Multi-specialty", "Emergency", "Robotics"], OnCall),
        entry("Sahara Hospital", "Gomti Nagar, Lucknow", "8 km", &["Multi-specialty", "Neuro", "Critical Care"], Available),
        entry("SGPGI", "Raebareli Road, Lucknow", "12 km", &["Tertiary Care", "Research", "Endocrinology"], Unavailable),
        entry("Ram Manohar Lohia Institute of Medical Sciences", "Gomti Nagar, Lucknow", "7 km", &["Public Hospital", "Cardiology", "Neurology"], Available),
    ]),
];

/// Name suffix, street address, distance, services, availability. Name and
/// address both get the city interpolated.
#[rustfmt::skip]
const PLACEHOLDERS: &[(&str, &str, &str, &[&str], EmergencyAvailability)] = &[
    ("Central Hospital", "1 Civic Center Plaza", "2.5 km", &["Emergency", "General Surgery", "Radiology"], Available),
    ("Riverside Medical Group", "8 River St", "4.8 km", &["Family Medicine", "Pediatrics", "Dermatology"], OnCall),
    ("St. Mary's Health Center", "900 Mercy Ave", "6.2 km", &["Maternity", "Cardiology", "Oncology"], Available),
    ("Community General Hospital", "33 Union Sq", "8.0 km", &["Orthopedics", "Neurology", "Rehabilitation"], Unavailable),
    ("Lakeview Regional Clinic", "15 Lake Rd", "10.5 km", &["Preventive Care", "Diagnostics", "Urology"], OnCall),
];

/// Hospitals for `city`. Known cities match case-insensitively; anything
/// else gets the placeholder set built around the given name.
pub fn lookup_hospitals(city: &str) -> Vec<HospitalRecord> {
    let city = city.trim();
    if let Some((_, entries)) = DIRECTORY
        .iter()
        .find(|(known, _)| known.eq_ignore_ascii_case(city))
    {
        return entries.iter().map(Entry::to_record).collect();
    }

    PLACEHOLDERS
        .iter()
        .map(|&(name, street, distance, services, availability)| HospitalRecord {
            name: format!("{city} {name}"),
            address: format!("{street}, {city}"),
            distance: distance.to_string(),
            services: services.iter().map(|s| s.to_string()).collect(),
            emergency_doctor_availability: availability,
        })
        .collect()
}

pub fn find_hospitals_tool() -> ToolDescriptor {
    ToolDescriptor::new(
        FIND_HOSPITALS_TOOL,
        format!(
            "Returns a list of hospitals for a given city in India. Supported cities are: {}.",
            SUPPORTED_CITIES.join(", ")
        ),
        Schema::object(
            "find_hospitals_input",
            vec![Field::required(
                "city",
                "The city in India to search for hospitals in.",
                SchemaType::String,
            )],
        ),
        Schema::array("find_hospitals_output", hospital_record_type()),
        |arguments: Value| {
            let city = arguments
                .get("city")
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|city| !city.is_empty())
                .ok_or_else(|| "city must be a non-empty string".to_string())?;
            serde_json::to_value(lookup_hospitals(city)).map_err(|e| e.to_string())
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GenerationError;
    use serde_json::json;

    #[test]
    fn directory_covers_every_supported_city() {
        for city in SUPPORTED_CITIES {
            let hospitals = lookup_hospitals(city);
            assert_eq!(hospitals.len(), 5, "{city}");
            assert!(hospitals.iter().all(|h| h.address.contains(city)));
        }
    }

    #[test]
    fn city_match_ignores_case_and_whitespace() {
        assert_eq!(lookup_hospitals("  mUMBAI "), lookup_hospitals("Mumbai"));
        assert_eq!(lookup_hospitals("Mumbai")[0].name, "Bombay Hospital & Medical Research Centre");
    }

    #[test]
    fn unknown_city_gets_placeholders() {
        let hospitals = lookup_hospitals("Nowhereville");
        assert_eq!(hospitals.len(), PLACEHOLDERS.len());
        for hospital in &hospitals {
            assert!(hospital.name.contains("Nowhereville"), "{}", hospital.name);
            assert!(hospital.address.contains("Nowhereville"), "{}", hospital.address);
        }
        assert_eq!(hospitals[0].name, "Nowhereville Central Hospital");
        assert_eq!(hospitals[0].address, "1 Civic Center Plaza, Nowhereville");
        assert_eq!(hospitals, lookup_hospitals("Nowhereville"));
    }

    #[test]
    fn tool_returns_schema_valid_records() {
        let output = find_hospitals_tool().call(json!({ "city": "Pune" })).unwrap();
        let records: Vec<HospitalRecord> = serde_json::from_value(output).unwrap();
        assert_eq!(records, lookup_hospitals("Pune"));
    }

    #[test]
    fn tool_rejects_blank_city() {
        let err = find_hospitals_tool().call(json!({ "city": "   " })).unwrap_err();
        assert!(matches!(
            err,
            GenerationError::ToolInvocation { ref tool, .. } if tool == FIND_HOSPITALS_TOOL
        ));
    }
}
