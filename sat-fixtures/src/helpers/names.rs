use rand::Rng;

/// Random ASCII letters, used for entity names that must not collide between runs.
pub fn gen_alpha(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| {
            let offset = rng.gen_range(0..52u8);
            if offset < 26 {
                (b'a' + offset) as char
            } else {
                (b'A' + offset - 26) as char
            }
        })
        .collect()
}

/// Random lowercase letters, used for DNS zone and domain labels.
pub fn gen_dns_label(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len).map(|_| (b'a' + rng.gen_range(0..26u8)) as char).collect()
}
