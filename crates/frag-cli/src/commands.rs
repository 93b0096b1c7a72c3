use std::sync::Arc;

use anyhow::Context;
use colored::Colorize;
use frag_codec::{FragmentCodec, Poly};
use frag_sdk::{Inventory, InventoryFilter, ManagedObject, Platform, PlatformConfig, PlatformResult, TenantConfig};
use frag_store::StoreError;
use frag_tenant::{EventLog, TenantReport, TenantScope};
use frag_types::{TenantId, TenantIdentity};
use serde_json::Value;

use crate::business::{self, CustomDevice, HumiditySensor, PressureSensor, Sensor, SensorArray, SensorAssembly, TemperatureSensor};
use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(&cli)?;
    match cli.command {
        Command::Inventory(args) => cmd_inventory(config, args),
        Command::Serialize(args) => cmd_serialize(config, args),
        Command::Subscriptions(args) => cmd_subscriptions(config, args),
        Command::Config(args) => cmd_config(config, args),
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<PlatformConfig> {
    let config = match &cli.config {
        Some(path) => PlatformConfig::from_path(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => demo_config(),
    };
    Ok(config.with_env_overrides()?)
}

/// Two demo tenants against the in-memory store.
fn demo_config() -> PlatformConfig {
    let tenant = |id: &str, roles: &[&str]| TenantConfig {
        id: id.into(),
        user: "service_cookbook".into(),
        password: "demo".into(),
        roles: roles.iter().map(|r| r.to_string()).collect(),
    };
    PlatformConfig {
        tenants: vec![
            tenant("t100", &["ROLE_INVENTORY_READ", "ROLE_INVENTORY_ADMIN"]),
            tenant("t200", &["ROLE_INVENTORY_READ"]),
        ],
        options: [("greeting", "hello from the settings service"), ("poll.interval", "30s")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
        ..PlatformConfig::default()
    }
}

fn platform(config: PlatformConfig) -> anyhow::Result<Platform> {
    Ok(Platform::in_memory(config, business::registry()?)?)
}

fn print_report<E: std::fmt::Display>(report: &TenantReport<E>) {
    for outcome in report.outcomes() {
        match &outcome.result {
            Ok(()) => println!("  {} {}", "✓".green(), outcome.tenant.to_string().bold()),
            Err(failure) => println!("  {} {}: {}", "✗".red(), outcome.tenant.to_string().bold(), failure),
        }
    }
}

// ---- inventory ----

fn cmd_inventory(config: PlatformConfig, args: InventoryArgs) -> anyhow::Result<()> {
    let platform = platform(config)?;
    let work = |scope: &TenantScope| inventory_cookbook(&platform.inventory(scope), &args);

    match &args.tenant {
        Some(tenant) => {
            platform.tenants().run_for_tenant(&TenantId::new(tenant.as_str()), work)?;
        }
        None => {
            let report = platform.tenants().run_for_each_tenant(work);
            println!("\n{}", "Summary".bold());
            print_report(&report);
        }
    }
    Ok(())
}

fn inventory_cookbook(inventory: &Inventory, args: &InventoryArgs) -> PlatformResult<()> {
    let tenant = inventory.scope().tenant().clone();
    println!("{} {}", "Tenant".bold(), tenant.to_string().cyan());

    let mut ids = Vec::with_capacity(args.count);
    for n in 0..args.count {
        let device = CustomDevice {
            manufacturer: args.manufacturer.clone(),
            model: format!("foobar {n}"),
        };
        let created = inventory.create_with(&device)?;
        let id = created.id().cloned().ok_or(StoreError::MissingId)?;
        println!("  {} device {} ({})", "created".green(), id.to_string().yellow(), device.model);
        ids.push(id);
    }

    let first = inventory.find::<CustomDevice>(None)?.elements(1)?;
    println!("  first device by fragment type: {}", describe(&first));

    let query = format!(
        "{}.manufacturer eq '{}'",
        FragmentCodec::default_fragment_name::<CustomDevice>()?,
        args.manufacturer
    );
    let matching = inventory.find::<CustomDevice>(Some(&query))?.all_pages()?;
    println!("  {} device(s) match {}", matching.len().to_string().bold(), query.dimmed());

    for id in &ids {
        let mut device: CustomDevice = inventory.read(id)?;
        device.model = format!("{} (rev 2)", device.model);
        inventory.write(id, &device)?;
    }
    println!("  {} {} device(s)", "updated".green(), ids.len());

    for id in &ids {
        inventory.delete(id)?;
    }
    let remaining = inventory.query(InventoryFilter::all()).all_pages()?;
    println!("  {} {} device(s), {} left", "deleted".green(), ids.len(), remaining.len());
    Ok(())
}

fn describe(objects: &[ManagedObject]) -> String {
    objects
        .iter()
        .map(|o| o.id().map(ToString::to_string).unwrap_or_default())
        .collect::<Vec<_>>()
        .join(", ")
}

// ---- serialize ----

fn cmd_serialize(config: PlatformConfig, args: SerializeArgs) -> anyhow::Result<()> {
    let registry = business::registry()?;
    let codec = FragmentCodec::new(registry, config.codec_mode);
    println!("Codec mode: {}", codec.mode().to_string().cyan());

    let array = SensorArray {
        sensors: vec![
            Poly::new(TemperatureSensor { reading: 21.5 }),
            Poly::new(HumiditySensor { reading: 40.0 }),
        ],
    };
    let mut object = ManagedObject::new();
    let name = codec.write_into(&mut object, &array, None)?;
    let assembly = SensorAssembly {
        sensor: Poly::new(HumiditySensor { reading: 55.0 }),
    };
    codec.write_into(&mut object, &assembly, None)?;
    if args.payloads {
        println!("{}", serde_json::to_string_pretty(&object.to_json())?);
    }

    println!("\n{}", "Naive round trip".bold());
    let naive: Value = codec.read_value_from(&object, &name)?;
    if let Some(sensors) = naive.get("sensors").and_then(Value::as_array) {
        for sensor in sensors {
            println!("  {} untyped map {}", "?".yellow(), sensor);
        }
    }

    println!("\n{}", "Tagged round trip".bold());
    let typed: SensorArray = codec.read_from(&object, None)?;
    for sensor in &typed.sensors {
        print_sensor(sensor);
    }
    let typed: SensorAssembly = codec.read_from(&object, None)?;
    print_sensor(&typed.sensor);

    if args.show_rejection {
        println!("\n{}", "Unregistered element".bold());
        let rogue = SensorArray {
            sensors: vec![
                Poly::new(TemperatureSensor { reading: 18.0 }),
                Poly::new(PressureSensor { reading: 1013.0 }),
            ],
        };
        let encoded = codec.encode(&rogue, None)?;
        match codec.decode::<SensorArray>(&encoded.payload) {
            Ok(_) => println!("  {} decoded unexpectedly", "✗".red()),
            Err(err) => println!("  {} rejected: {}", "✓".green(), err),
        }
    }
    Ok(())
}

fn print_sensor(sensor: &Poly<dyn Sensor>) {
    println!(
        "  {} {} {}{}",
        "✓".green(),
        sensor.type_tag().cyan(),
        sensor.reading(),
        sensor.unit()
    );
}

// ---- subscriptions ----

fn cmd_subscriptions(config: PlatformConfig, args: SubscriptionsArgs) -> anyhow::Result<()> {
    let platform = platform(config)?;
    let log = Arc::new(EventLog::new());
    platform.subscriptions().add_listener(log.clone());

    println!("{}", "Subscribed tenants".bold());
    for identity in platform.tenants().directory().list_tenants() {
        print_identity(&identity);
    }

    let late = TenantIdentity::new(
        TenantId::new("t300"),
        platform.base_url(),
        frag_types::Credentials::new("service_cookbook", "demo"),
    );
    platform.subscriptions().subscribe(late);

    println!("\n{}", "Run for each tenant".bold());
    let work = |scope: &TenantScope| -> PlatformResult<()> {
        let inventory = Inventory::current(&platform)?;
        let current = platform.subscriptions().tenant();
        let device = CustomDevice {
            manufacturer: "Acme Corp".into(),
            model: format!("bound to {}", scope.tenant()),
        };
        inventory.create_with(&device)?;
        println!(
            "  current tenant {} (scope {})",
            current.map(|t| t.to_string()).unwrap_or_default().cyan(),
            scope.tenant()
        );
        Ok(())
    };
    let report = if args.parallel {
        platform.tenants().run_for_each_tenant_parallel(work)
    } else {
        platform.tenants().run_for_each_tenant(work)
    };
    print_report(&report);

    println!("\n{}", "Outside any tenant scope".bold());
    match Inventory::current(&platform) {
        Ok(_) => println!("  {} unexpectedly bound", "✗".red()),
        Err(err) => println!("  {} {}", "✓".green(), err),
    }

    platform.subscriptions().unsubscribe(&TenantId::new("t300"))?;

    println!("\n{}", "Subscription events".bold());
    for event in log.events() {
        println!("  {}", serde_json::to_string(&event)?);
    }
    Ok(())
}

fn print_identity(identity: &TenantIdentity) {
    let roles: Vec<&str> = identity.roles.iter().map(String::as_str).collect();
    println!(
        "  {} as {} at {} [{}]",
        identity.tenant.to_string().bold(),
        identity.qualified_user(),
        identity.base_url,
        roles.join(", ").dimmed()
    );
}

// ---- config ----

fn cmd_config(config: PlatformConfig, args: ConfigArgs) -> anyhow::Result<()> {
    match args.name {
        Some(name) => match config.options.get(&name) {
            Some(value) => println!("{value}"),
            None => anyhow::bail!("no setting named {name:?}"),
        },
        None => {
            println!("Base URL:   {}", config.base_url.cyan());
            println!("Page size:  {}", config.page_size);
            println!("Codec mode: {}", config.codec_mode);
            println!("Tenants:    {}", config.tenants.len());
            println!("{}", "Settings".bold());
            for (key, value) in &config.options {
                println!("  {} = {}", key.bold(), value);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demo_config_is_valid() {
        let config = demo_config();
        assert!(config.validate().is_ok());
        assert_eq!(config.tenants.len(), 2);
    }

    #[test]
    fn inventory_cookbook_cleans_up() {
        let platform = platform(demo_config()).unwrap();
        let args = InventoryArgs {
            tenant: None,
            manufacturer: "Acme Corp".into(),
            count: 2,
        };
        let report = platform
            .tenants()
            .run_for_each_tenant(|scope| inventory_cookbook(&platform.inventory(scope), &args));
        assert!(report.is_success());
        assert_eq!(report.len(), 2);
    }

    #[test]
    fn serialize_command_runs() {
        let args = SerializeArgs {
            show_rejection: true,
            payloads: false,
        };
        cmd_serialize(demo_config(), args).unwrap();
    }

    #[test]
    fn subscriptions_command_runs() {
        cmd_subscriptions(demo_config(), SubscriptionsArgs { parallel: true }).unwrap();
    }

    #[test]
    fn config_command_rejects_unknown_setting() {
        let args = ConfigArgs {
            name: Some("nope".into()),
        };
        assert!(cmd_config(demo_config(), args).is_err());
    }
}
