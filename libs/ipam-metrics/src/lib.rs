#![doc = include_str!("../README.md")]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]

pub mod http;
pub mod metrics;

/// A short-hand way to access one of the labelled metrics in `ipam_metrics::metrics`
#[macro_export]
macro_rules! metric {
    ($metric_name: ident, $($label_name: ident),+) => {
        $crate::metrics::$metric_name.with_label_values(&[$($crate::metrics::label_values::$label_name),+])
    };
}
