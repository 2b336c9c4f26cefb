fn main() {
    // Only the device build needs the ESP-IDF environment; host builds
    // (tests, fuzzing) run without it.
    #[cfg(feature = "espidf")]
    embuild::espidf::sysenv::output();
}
