use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use emu_core::cpu_8086::{Cpu8086, Io8086, Memory8086};

/// Flat 1 MiB memory implementation for benchmarking.
struct BenchMemory {
    ram: Vec<u8>,
}

impl BenchMemory {
    fn new() -> Self {
        let mut ram = vec![0; 1 << 20];

        // Power-on CS:IP is 0xFFFF:0x0000, physical 0xFFFF0. Loop:
        // MOV AX, 0x1234 ; INC CX ; DEC DX ; JMP short back
        let code: &[u8] = &[0xB8, 0x34, 0x12, 0x41, 0x4A, 0xEB, 0xF9];
        let base = 0xFFFF0usize;
        ram[base..base + code.len()].copy_from_slice(code);

        Self { ram }
    }
}

impl Memory8086 for BenchMemory {
    fn read(&self, addr: u32) -> u8 {
        self.ram[addr as usize]
    }

    fn write(&mut self, addr: u32, val: u8) {
        self.ram[addr as usize] = val;
    }
}

impl Io8086 for BenchMemory {
    fn in8(&mut self, _port: u16) -> u8 {
        0xFF
    }

    fn out8(&mut self, _port: u16, _val: u8) {}
}

fn bench_cpu_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("cpu_8086_step");

    group.bench_function("single_instruction", |b| {
        b.iter(|| {
            let mut cpu = Cpu8086::new(BenchMemory::new());
            cpu.reset();
            cpu.step();
            black_box(cpu.ax);
        });
    });

    group.finish();
}

fn bench_cpu_multiple_steps(c: &mut Criterion) {
    let mut group = c.benchmark_group("cpu_8086_multiple_steps");

    for step_count in [10, 100, 1000].iter() {
        group.bench_with_input(
            BenchmarkId::from_parameter(step_count),
            step_count,
            |b, &count| {
                b.iter(|| {
                    let mut cpu = Cpu8086::new(BenchMemory::new());
                    cpu.reset();
                    for _ in 0..count {
                        cpu.step();
                    }
                    black_box(cpu.cycles);
                });
            },
        );
    }

    group.finish();
}

fn bench_cpu_modrm_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("cpu_8086_modrm");

    group.bench_function("mov_ax_imm_loop", |b| {
        b.iter(|| {
            let mut cpu = Cpu8086::new(BenchMemory::new());
            cpu.reset();
            for _ in 0..100 {
                cpu.step();
            }
            black_box(cpu.cx);
        });
    });

    group.finish();
}

fn bench_cpu_reset(c: &mut Criterion) {
    c.bench_function("cpu_8086_reset", |b| {
        let mut cpu = Cpu8086::new(BenchMemory::new());
        b.iter(|| {
            cpu.reset();
            black_box(cpu.ip);
        });
    });
}

criterion_group!(
    benches,
    bench_cpu_step,
    bench_cpu_multiple_steps,
    bench_cpu_modrm_decode,
    bench_cpu_reset
);
criterion_main!(benches);
