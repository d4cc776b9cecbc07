use packos::{Packer, PackingOptions, PlacedRect};

fn main() {
    env_logger::init();

    let inputs = (0..5).map(|index| PlacedRect::with_data((128, 128), index));

    let mut packer = Packer::new(PackingOptions::new().with_max_size((256, 256)));
    let placements = packer.add_many(inputs);

    println!("Pack result: {:#?}", placements);

    for (index, bin) in packer.bins().iter().enumerate() {
        println!(
            "Bin {}: {}x{} holding {} rects",
            index,
            bin.width(),
            bin.height(),
            bin.rects().len()
        );
    }
}
