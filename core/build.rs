fn main() {
    uniffi::generate_scaffolding("src/bluejay.udl").unwrap();
}
