//! Composite identifier formats
//!
//! Part order is part of the persisted format and must not change.

use crate::identifier::IdentifierFormat;

pub const DISK_ATTACHMENT: IdentifierFormat =
    IdentifierFormat::new("disk attachment", &["disk_name", "instance_name"]);

pub const LOAD_BALANCER_ATTACHMENT: IdentifierFormat = IdentifierFormat::new(
    "load balancer attachment",
    &["load_balancer_name", "instance_name"],
);

pub const LOAD_BALANCER_CERTIFICATE: IdentifierFormat = IdentifierFormat::new(
    "load balancer certificate",
    &["load_balancer_name", "certificate_name"],
);

/// Apex records have an empty name
pub const DOMAIN_ENTRY: IdentifierFormat =
    IdentifierFormat::new("domain entry", &["name", "domain_name", "type", "target"])
        .allowing_empty();

pub const STATIC_IP_ATTACHMENT: IdentifierFormat =
    IdentifierFormat::new("static ip attachment", &["static_ip_name", "instance_name"]);

pub const BUCKET_ACCESS_KEY: IdentifierFormat =
    IdentifierFormat::new("bucket access key", &["bucket_name", "access_key_id"]);

pub const BUCKET_RESOURCE_ACCESS: IdentifierFormat =
    IdentifierFormat::new("bucket resource access", &["bucket_name", "resource_name"]);
