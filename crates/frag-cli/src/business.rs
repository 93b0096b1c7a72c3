//! Business types used by the cookbook commands.

use std::fmt;
use std::sync::Arc;

use frag_registry::{family_members, Family, Fragment, RegistryResult, Tagged, TypeRegistry};
use frag_codec::Poly;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CustomDevice {
    pub manufacturer: String,
    pub model: String,
}

impl Fragment for CustomDevice {
    const TYPE_TAG: Option<&'static str> = Some("cookbook.CustomDevice");
}

pub trait Sensor: Tagged + fmt::Debug {
    fn reading(&self) -> f64;
    fn unit(&self) -> &'static str;
}

impl Family for dyn Sensor {
    const NAME: &'static str = "sensor";
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TemperatureSensor {
    pub reading: f64,
}

impl Fragment for TemperatureSensor {
    const TYPE_TAG: Option<&'static str> = Some("cookbook.TemperatureSensor");
}

impl Sensor for TemperatureSensor {
    fn reading(&self) -> f64 {
        self.reading
    }

    fn unit(&self) -> &'static str {
        "°C"
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HumiditySensor {
    pub reading: f64,
}

impl Fragment for HumiditySensor {
    const TYPE_TAG: Option<&'static str> = Some("cookbook.HumiditySensor");
}

impl Sensor for HumiditySensor {
    fn reading(&self) -> f64 {
        self.reading
    }

    fn unit(&self) -> &'static str {
        "%RH"
    }
}

/// Implements `Sensor` but is left out of the registry.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PressureSensor {
    pub reading: f64,
}

impl Fragment for PressureSensor {
    const TYPE_TAG: Option<&'static str> = Some("cookbook.PressureSensor");
}

impl Sensor for PressureSensor {
    fn reading(&self) -> f64 {
        self.reading
    }

    fn unit(&self) -> &'static str {
        "hPa"
    }
}

family_members!(dyn Sensor => TemperatureSensor, HumiditySensor, PressureSensor);

#[derive(Debug, Serialize, Deserialize)]
pub struct SensorArray {
    pub sensors: Vec<Poly<dyn Sensor>>,
}

impl Fragment for SensorArray {
    const TYPE_TAG: Option<&'static str> = Some("cookbook.SensorArray");
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SensorAssembly {
    pub sensor: Poly<dyn Sensor>,
}

impl Fragment for SensorAssembly {
    const TYPE_TAG: Option<&'static str> = Some("cookbook.SensorAssembly");
}

pub fn registry() -> RegistryResult<Arc<TypeRegistry>> {
    Ok(TypeRegistry::builder()
        .register::<CustomDevice>()?
        .register_member::<dyn Sensor, TemperatureSensor>()?
        .register_member::<dyn Sensor, HumiditySensor>()?
        .register::<SensorArray>()?
        .register::<SensorAssembly>()?
        .build())
}
