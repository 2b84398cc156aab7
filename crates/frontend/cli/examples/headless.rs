use emu_core::System;
use emu_pc::PcSystem;

fn main() {
    let mut sys = PcSystem::new();
    let frame = sys.step_frame().unwrap();
    println!("Headless PC frame: {}x{}", frame.width, frame.height);
    println!(
        "Save-state: {}",
        serde_json::to_string_pretty(&sys.save_state()).unwrap()
    );
}
