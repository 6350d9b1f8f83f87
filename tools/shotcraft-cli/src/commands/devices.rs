//! List the device catalogue.

use shotcraft_project_model::{DeviceCategory, DeviceSize};

pub fn run(category: Option<String>) -> anyhow::Result<()> {
    let devices = match category.as_deref() {
        Some(key) => {
            let category = DeviceCategory::from_key(key)
                .ok_or_else(|| anyhow::anyhow!("Unknown device category: {key}"))?;
            DeviceSize::sizes_for(category)
        }
        None => DeviceSize::all(),
    };

    let mut current = None;
    for device in &devices {
        if current != Some(device.category) {
            current = Some(device.category);
            println!("{}", device.category.display_name());
        }
        let landscape = if device.category.supports_landscape() {
            " (landscape supported)"
        } else {
            ""
        };
        println!(
            "  {:<24} {:>5}x{:<5} {}{landscape}",
            device.name, device.portrait_width, device.portrait_height, device.display_size
        );
    }

    Ok(())
}
