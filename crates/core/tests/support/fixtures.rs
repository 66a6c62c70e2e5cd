//! Reference customer configurations and record builders

#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use crmsync_domain::{
    ContactMappingConfig, CustomerMappingConfig, EntityMappingConfig, OpportunityMappingConfig,
    ProbabilityEncoding, ProbabilityFieldConfig, RawFieldBag, StagedRecord,
};
use serde_json::Value;

pub const HUBSPOT: &str = "hubspot";
pub const SALESFORCE: &str = "salesforce";

/// Timestamp `ms` milliseconds after the epoch
pub fn ts(ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms).single().unwrap_or_default()
}

fn contact(object: &str, first_name: &str, last_name: &str) -> EntityMappingConfig {
    EntityMappingConfig::Contact(ContactMappingConfig {
        object: object.into(),
        first_name: Some(first_name.into()),
        last_name: Some(last_name.into()),
        required_fields: Vec::new(),
    })
}

fn opportunity(
    object: &str,
    name: &str,
    description: &str,
    probability: &str,
    encoding: ProbabilityEncoding,
    amount: Option<&str>,
) -> EntityMappingConfig {
    EntityMappingConfig::Opportunity(OpportunityMappingConfig {
        object: object.into(),
        name: Some(name.into()),
        description: Some(description.into()),
        probability: Some(ProbabilityFieldConfig { field: probability.into(), encoding }),
        amount: amount.map(str::to_string),
        required_fields: Vec::new(),
    })
}

/// HubSpot customer: `contact` and `deal`, fractional probability strings
pub fn user1() -> CustomerMappingConfig {
    CustomerMappingConfig {
        customer_id: "user1".into(),
        provider_name: HUBSPOT.into(),
        mappings: vec![
            contact("contact", "firstname", "lastname"),
            opportunity(
                "deal",
                "dealname",
                "description",
                "hs_deal_stage_probability",
                ProbabilityEncoding::Fraction,
                Some("amount"),
            ),
        ],
    }
}

/// Salesforce customer: `Lead` and `Opportunity`, percent picklist
pub fn user2() -> CustomerMappingConfig {
    CustomerMappingConfig {
        customer_id: "user2".into(),
        provider_name: SALESFORCE.into(),
        mappings: vec![
            contact("Lead", "FirstName", "LastName"),
            opportunity(
                "Opportunity",
                "Name",
                "Description",
                "ProbabilityV2__c",
                ProbabilityEncoding::PercentPicklist,
                None,
            ),
        ],
    }
}

/// Salesforce customer: `Contact` and `Opportunity`, float percentage
pub fn user3() -> CustomerMappingConfig {
    CustomerMappingConfig {
        customer_id: "user3".into(),
        provider_name: SALESFORCE.into(),
        mappings: vec![
            contact("Contact", "FirstName", "LastName"),
            opportunity(
                "Opportunity",
                "Name",
                "Description",
                "Probability",
                ProbabilityEncoding::Percentage,
                Some("Amount"),
            ),
        ],
    }
}

pub fn reference_customers() -> Vec<CustomerMappingConfig> {
    vec![user1(), user2(), user3()]
}

/// Live record with the given raw fields
pub fn live(external_id: &str, at_ms: i64, fields: &[(&str, Value)]) -> StagedRecord {
    let raw: RawFieldBag = fields.iter().map(|(k, v)| (*k, v.clone())).collect();
    StagedRecord::live(external_id, ts(at_ms), raw)
}

pub fn deleted(external_id: &str, at_ms: i64) -> StagedRecord {
    StagedRecord::deleted(external_id, ts(at_ms))
}
