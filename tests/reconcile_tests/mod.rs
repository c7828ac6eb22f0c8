mod che_scenarios;
mod memory_store;
mod tekton_scenarios;
