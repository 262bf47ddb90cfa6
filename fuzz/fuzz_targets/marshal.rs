#![no_main]

use libfuzzer_sys::fuzz_target;
use vmsys::native::{check_arguments, NativeType, WORD_SIZE};

// Layout: [type count][type tags...][size delta][slot bytes...]
fuzz_target!(|data: &[u8]| {
    let Some((&count, rest)) = data.split_first() else {
        return;
    };
    let count = usize::from(count).min(rest.len());
    let (tags, rest) = rest.split_at(count);
    let types: Vec<NativeType> = tags
        .iter()
        .map(|tag| NativeType::from_repr(tag % 8).unwrap_or(NativeType::Int32))
        .collect();

    let Some((&delta, rest)) = rest.split_first() else {
        return;
    };
    let slots: Vec<usize> = rest
        .chunks(WORD_SIZE)
        .map(|chunk| chunk.iter().fold(0usize, |acc, byte| (acc << 8) | usize::from(*byte)))
        .collect();

    // Mostly consistent sizes, occasionally off by a few bytes.
    let size = (slots.len() * WORD_SIZE).wrapping_add(usize::from(delta % 4).wrapping_sub(1));
    let _ = check_arguments(&slots, &types, size);
});
