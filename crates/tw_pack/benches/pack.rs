use divan::AllocProfiler;

#[global_allocator]
static ALLOC: AllocProfiler = AllocProfiler::system();

fn main() {
    divan::main();
}

fn build_pack() -> tw_pack::PackFile {
    let mut pack = tw_pack::PackFile::new("bench.pack");
    for i in 0..512 {
        let name = format!("file_{i:04}.bin");
        let data = vec![(i % 251) as u8; 256 + i];
        pack.add_file(
            &format!("db/table_{}/{}", i % 16, name),
            tw_pack::PackedFile::from_bytes(name.clone(), data),
            false,
        );
    }
    pack
}

fn get_input() -> Vec<u8> {
    build_pack().to_bytes().unwrap()
}

pub mod read {
    use divan::Bencher;
    use std::io::Cursor;
    use tw_pack::{PackFile, PackReader};

    #[divan::bench]
    fn open(bencher: Bencher) {
        bencher.with_inputs(super::get_input).bench_refs(|data| {
            divan::black_box(PackReader::new(Cursor::new(data)).unwrap());
        });
    }

    #[divan::bench]
    fn access_file(bencher: Bencher) {
        bencher
            .with_inputs(|| PackReader::new(Cursor::new(super::get_input())).unwrap())
            .bench_refs(|pack| {
                divan::black_box(pack.by_index(0).unwrap());
            });
    }

    #[divan::bench(sample_count = 10)]
    fn load_tree(bencher: Bencher) {
        bencher.with_inputs(super::get_input).bench_refs(|data| {
            divan::black_box(PackFile::from_bytes("bench.pack", data).unwrap());
        });
    }
}

pub mod write {
    use divan::Bencher;

    #[divan::bench(sample_count = 10)]
    fn encode(bencher: Bencher) {
        bencher.with_inputs(super::build_pack).bench_refs(|pack| {
            let mut buffer = Vec::new();
            divan::black_box(tw_pack::encode(pack, &mut buffer).unwrap());
        });
    }
}
