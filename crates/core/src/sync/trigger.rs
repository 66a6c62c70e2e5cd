//! Trigger event filtering

use crmsync_domain::{ObjectType, SkipReason, SyncCompleteEvent, SyncResultStatus};

/// The part of an accepted trigger the engine needs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncRequest {
    pub provider_name: String,
    pub customer_id: String,
    pub external_object: String,
}

/// Accept only successful, standard-object, object-level events
///
/// # Errors
/// Returns the [`SkipReason`] for every other event shape.
pub fn filter_event(event: &SyncCompleteEvent) -> Result<SyncRequest, SkipReason> {
    let SyncCompleteEvent::Object(object) = event else {
        return Err(SkipReason::NotObjectSync);
    };

    if object.object_type != ObjectType::Standard {
        return Err(SkipReason::NotStandardObject);
    }

    if object.base.result != SyncResultStatus::Success {
        return Err(SkipReason::UpstreamFailed { error_message: object.base.error_message.clone() });
    }

    Ok(SyncRequest {
        provider_name: object.base.provider_name.clone(),
        customer_id: object.base.customer_id.clone(),
        external_object: object.object.clone(),
    })
}
